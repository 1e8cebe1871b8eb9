use std::ops::Range;
use std::time::{Duration, Instant};

use ndarray::{Array2, ArrayD, ArrayViewD, Axis, IxDyn, Slice, s};
use num_complex::Complex64;
use phasegraph_core::{ConfigurationError, Dual, Model, ShapeError, value_of};
use tracing::{debug, trace};

use crate::context::{Batch, Context};
use crate::jacobian::{assemble, tangent};
use crate::sequence::Plan;
use crate::{Jacobian, Options, Parameter, Sequence, SimulationError, TissueParameters, engine};

/// Timing and truncation diagnostics, collected when
/// [`Options::verbose`] is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
    /// Wall time of the signal pass.
    pub forward: Duration,
    /// Wall time of the derivative passes, if any were requested.
    pub jacobian: Option<Duration>,
    /// Number of lane chunks simulated per pass.
    pub chunks: usize,
    /// State lines that lost a non-zero highest order during the signal pass.
    pub truncations: usize,
}

/// Result of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    signal: ArrayD<Complex64>,
    jacobian: Option<Jacobian>,
    parameters: Vec<Parameter>,
    info: Option<Info>,
    blocks: usize,
}

impl Simulation {
    /// Returns the signal, shaped `(samples, *batch_shape)`.
    ///
    /// Multi-block sequences record their blocks one after the other.
    #[must_use]
    pub fn signal(&self) -> &ArrayD<Complex64> {
        &self.signal
    }

    /// Returns the Jacobian, shaped `(samples, *batch_shape, parameters)`.
    #[must_use]
    pub fn jacobian(&self) -> Option<&Jacobian> {
        self.jacobian.as_ref()
    }

    /// Returns the parameters along the last Jacobian axis, in order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[must_use]
    pub fn info(&self) -> Option<&Info> {
        self.info.as_ref()
    }

    #[must_use]
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Returns the samples of one inversion block.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<ArrayViewD<'_, Complex64>> {
        if index >= self.blocks {
            return None;
        }
        let length = self.signal.len_of(Axis(0)) / self.blocks;
        let start = index * length;
        Some(
            self.signal
                .slice_axis(Axis(0), Slice::from(start..start + length)),
        )
    }
}

/// Simulates `sequence` for every lane of `tissue`.
///
/// Lanes are simulated in chunks of at most [`Options::max_chunk_size`];
/// chunking never changes the result. Each requested derivative costs one
/// extra pass over all lanes on dual numbers.
///
/// # Errors
///
/// Returns [`SimulationError::Configuration`] if a requested derivative does
/// not apply to the tissue or sequence. All checks run before any state is
/// created.
pub fn simulate(
    sequence: &Sequence,
    tissue: &TissueParameters,
    options: &Options,
) -> Result<Simulation, SimulationError> {
    let plan = sequence.plan();
    check_derivatives(&plan, tissue, options.diff())?;

    let batch = Batch::new(tissue)?;
    let lanes = tissue.lanes();
    let chunks = chunk_ranges(lanes, options.max_chunk_size());
    debug!(
        sequence = sequence.name(),
        lanes,
        samples = plan.samples(),
        chunks = chunks.len(),
        diff = options.diff().len(),
        "simulating"
    );

    let started = Instant::now();
    let mut signal = Array2::<Complex64>::zeros((plan.samples(), lanes));
    let mut truncations = 0;
    for range in &chunks {
        trace!(start = range.start, end = range.end, "signal chunk");
        let context = Context::<f64>::new(
            tissue.model(),
            &batch,
            &plan,
            options.nstates(),
            range.clone(),
            None,
        )?;
        let trace = engine::run(&plan, &context)?;
        signal
            .slice_mut(s![.., range.clone()])
            .assign(&trace.signal.mapv(value_of));
        truncations += trace.truncations;
    }
    let forward = started.elapsed();
    if truncations > 0 {
        debug!(truncations, "highest dephasing order was truncated");
    }

    let mut dims = vec![plan.samples()];
    dims.extend_from_slice(tissue.shape());

    let started = Instant::now();
    let jacobian = if options.diff().is_empty() {
        None
    } else {
        let mut columns = Vec::with_capacity(options.diff().len());
        for &parameter in options.diff() {
            debug!(%parameter, "derivative pass");
            columns.push(derivative(&plan, tissue, &batch, options, &chunks, parameter)?);
        }
        Some(assemble(&columns, &dims)?)
    };
    let elapsed = started.elapsed();

    let info = options.verbose().then(|| Info {
        forward,
        jacobian: jacobian.as_ref().map(|_| elapsed),
        chunks: chunks.len(),
        truncations,
    });

    Ok(Simulation {
        signal: signal
            .into_shape_with_order(IxDyn(&dims))
            .map_err(ShapeError::from)?,
        jacobian,
        parameters: options.diff().to_vec(),
        info,
        blocks: plan.blocks,
    })
}

/// One column of the Jacobian, `(samples, lanes)`.
fn derivative(
    plan: &Plan,
    tissue: &TissueParameters,
    batch: &Batch,
    options: &Options,
    chunks: &[Range<usize>],
    parameter: Parameter,
) -> Result<Array2<Complex64>, ShapeError> {
    let mut column = Array2::zeros((plan.samples(), tissue.lanes()));
    for range in chunks {
        let context = Context::<Dual>::new(
            tissue.model(),
            batch,
            plan,
            options.nstates(),
            range.clone(),
            Some(parameter),
        )?;
        let trace = engine::run(plan, &context)?;
        column
            .slice_mut(s![.., range.clone()])
            .assign(&tangent(&trace.signal));
    }
    Ok(column)
}

/// Splits `lanes` into contiguous chunks of at most `max` lanes.
fn chunk_ranges(lanes: usize, max: Option<usize>) -> Vec<Range<usize>> {
    let size = max.unwrap_or(lanes).clamp(1, lanes.max(1));
    (0..lanes)
        .step_by(size)
        .map(|start| start..(start + size).min(lanes))
        .collect()
}

fn check_derivatives(
    plan: &Plan,
    tissue: &TissueParameters,
    diff: &[Parameter],
) -> Result<(), ConfigurationError> {
    for &parameter in diff {
        let reason = if !parameter.is_timing() && tissue.get(parameter).is_none() {
            Some("the tissue does not define it")
        } else {
            plan.unsupported(parameter)
        };
        if let Some(reason) = reason {
            return Err(ConfigurationError::NotDifferentiable {
                name: parameter.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

/// A sequence and its options, callable on any tissue.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulator {
    sequence: Sequence,
    options: Options,
}

impl Simulator {
    #[must_use]
    pub fn new(sequence: impl Into<Sequence>, options: Options) -> Self {
        Self {
            sequence: sequence.into(),
            options,
        }
    }

    #[must_use]
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl Model for Simulator {
    type Input = TissueParameters;
    type Output = Simulation;
    type Error = SimulationError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        simulate(&self.sequence, input, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use uom::si::angle::degree;
    use uom::si::f64::{Angle, Time};
    use uom::si::time::millisecond;

    use crate::{SpgrConfig, Train};

    // --- Test fixtures ---

    fn spgr() -> Sequence {
        Train::constant(
            Angle::new::<degree>(15.0),
            10,
            Time::new::<millisecond>(10.0),
        )
        .map(SpgrConfig::new)
        .expect("valid train")
        .into()
    }

    #[test]
    fn chunks_cover_every_lane() {
        assert_eq!(chunk_ranges(5, None), vec![0..5]);
        assert_eq!(chunk_ranges(5, Some(2)), vec![0..2, 2..4, 4..5]);
        assert_eq!(chunk_ranges(3, Some(10)), vec![0..3]);
        assert_eq!(chunk_ranges(1, None), vec![0..1]);
    }

    #[test]
    fn signal_shape_follows_batch() {
        let tissue = TissueParameters::builder(
            ndarray::Array2::from_elem((2, 3), 1000.0).into_dyn(),
            100.0,
        )
        .build()
        .expect("valid tissue");
        let simulation = simulate(&spgr(), &tissue, &Options::default()).expect("should run");

        assert_eq!(simulation.signal().shape(), &[10, 2, 3]);
        assert!(simulation.jacobian().is_none());
        assert!(simulation.info().is_none());
        assert_eq!(simulation.blocks(), 1);
        assert_eq!(
            simulation.block(0).expect("one block").shape(),
            &[10, 2, 3]
        );
        assert!(simulation.block(1).is_none());
    }

    #[test]
    fn verbose_reports_info() {
        let tissue = TissueParameters::builder(1000.0, 100.0)
            .build()
            .expect("valid tissue");
        let options = Options::default()
            .with_diff([Parameter::T1])
            .expect("valid diff")
            .with_verbose(true);
        let simulation = simulate(&spgr(), &tissue, &options).expect("should run");

        let info = simulation.info().expect("verbose");
        assert_eq!(info.chunks, 1);
        assert!(info.jacobian.is_some());
        assert_eq!(simulation.parameters(), &[Parameter::T1]);
    }

    #[test]
    fn missing_parameters_are_not_differentiable() {
        let tissue = TissueParameters::builder(1000.0, 100.0)
            .build()
            .expect("valid tissue");

        for parameter in [Parameter::T2Star, Parameter::Ti, Parameter::Kbm, Parameter::Diffusion] {
            let options = Options::default()
                .with_diff([parameter])
                .expect("valid diff");
            let error = simulate(&spgr(), &tissue, &options).expect_err("not differentiable");
            assert!(matches!(
                error,
                SimulationError::Configuration(ConfigurationError::NotDifferentiable { .. })
            ));
        }
    }

    #[test]
    fn simulator_is_a_model() {
        let simulator = Simulator::new(spgr(), Options::default());
        let tissue = TissueParameters::builder(1000.0, 100.0)
            .build()
            .expect("valid tissue");
        let direct = simulate(simulator.sequence(), &tissue, simulator.options())
            .expect("should run");
        assert_eq!(simulator.call(&tissue).expect("should run").signal(), direct.signal());
    }
}
