/// A callable model that maps a typed input to a typed output.
///
/// Simulators implement this trait so they can be driven generically by
/// parameter sweeps, fitting loops, or dictionary generators. Calls must be
/// deterministic: identical inputs always give identical outputs.
pub trait Model {
    type Input;
    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Calls the model with the given input.
    ///
    /// # Errors
    ///
    /// Each model defines its own `Error` type for setup failures.
    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}
