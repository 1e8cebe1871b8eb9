//! The sequence loop shared by every sequence kind.

use ndarray::{Array1, Array2};
use num_complex::Complex;
use phasegraph_core::{Real, ShapeError};
use phasegraph_epg::{
    DEFAULT_LINESHAPE, Diffusion, Flow, Inversion, Operator, Precession, Relaxation, RfPulse,
    Saturation, Shift, Spoil, States, Susceptibility,
};
use tracing::trace;

use crate::context::Context;
use crate::sequence::{Plan, Readout};

/// Signal of one chunk, `(samples, lanes)`.
#[derive(Debug, Clone)]
pub(crate) struct Trace<T: Real> {
    pub signal: Array2<Complex<T>>,
    pub truncations: usize,
}

/// Where the loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Preparation {
        block: usize,
        repetition: usize,
    },
    Excitation {
        block: usize,
        repetition: usize,
        pulse: usize,
    },
    Done,
}

/// Interval operators precomputed once per run.
struct Intervals<T: Real> {
    pulses: Vec<RfPulse<T>>,
    to_echo: Relaxation<T>,
    to_next: Relaxation<T>,
    precession: Option<(Precession<T>, Precession<T>)>,
    diffusion: Option<Diffusion<T>>,
    flow: Option<Flow<T>>,
    preparation: Option<(Inversion<T>, Relaxation<T>)>,
    recovery: Option<Relaxation<T>>,
}

impl<T: Real> Intervals<T> {
    fn new(plan: &Plan, context: &Context<T>) -> Self {
        let timing = context.timing;
        let saturate = context.layout.has_bound_pool();

        let pulses = plan
            .flips
            .iter()
            .enumerate()
            .map(|(n, &flip)| {
                let phase = plan.phases.as_ref().map(|phases| T::from_f64(phases[n]));
                let pulse = RfPulse::new(&context.transmit, T::from_f64(flip), phase);
                match plan.energies.as_ref() {
                    Some(energies) if saturate => pulse.with_saturation(
                        &context.transmit,
                        Saturation {
                            energy: T::from_f64(energies[n]),
                            lineshape: DEFAULT_LINESHAPE,
                        },
                    ),
                    _ => pulse,
                }
            })
            .collect();

        let rest = timing.tr - timing.te;
        let precession = (plan.readout == Readout::Balanced).then(|| {
            (
                Precession::new(&context.offresonance, timing.te),
                Precession::new(&context.offresonance, rest),
            )
        });

        let dk = plan.dk.map(T::from_f64);
        let diffusion = dk
            .zip(context.diffusion.clone())
            .map(|(dk, coefficient)| Diffusion::new(dk, timing.tr, coefficient));
        let flow = dk
            .zip(context.velocity.clone())
            .map(|(dk, velocity)| Flow::new(dk, timing.tr, velocity));

        let preparation = timing.ti.map(|ti| {
            let inversion = Inversion::new(context.efficiency.clone());
            let inversion = match plan.inversion_energy {
                Some(energy) if saturate => inversion.with_saturation(
                    &context.transmit,
                    Saturation {
                        energy: T::from_f64(energy),
                        lineshape: DEFAULT_LINESHAPE,
                    },
                ),
                _ => inversion,
            };
            (inversion, Relaxation::new(&context.rates, ti))
        });

        // Block time left after the inversion delay and the train.
        let recovery = timing.block.map(|block| {
            let busy = timing.ti.unwrap_or_else(T::zero)
                + T::from_f64(plan.flips.len() as f64) * timing.tr;
            Relaxation::new(&context.rates, block - busy)
        });

        Self {
            pulses,
            to_echo: Relaxation::new(&context.rates, timing.te),
            to_next: Relaxation::new(&context.rates, rest),
            precession,
            diffusion,
            flow,
            preparation,
            recovery,
        }
    }
}

/// Runs the plan on one chunk of lanes.
///
/// Every block makes `repetitions` passes through the train, each starting
/// with the preparation, if any. Only the last pass is recorded.
/// Each repetition applies the pulse, relaxes to the echo, records, relaxes
/// to the next pulse and dephases.
pub(crate) fn run<T: Real>(plan: &Plan, context: &Context<T>) -> Result<Trace<T>, ShapeError> {
    let intervals = Intervals::new(plan, context);
    let npulses = plan.flips.len();
    let mut states = States::equilibrium(context.layout);
    let mut signal = Array2::from_elem(
        (plan.samples(), context.layout.lanes()),
        Complex::new(T::zero(), T::zero()),
    );

    let mut stage = Stage::Preparation {
        block: 0,
        repetition: 0,
    };
    loop {
        stage = match stage {
            Stage::Preparation { block, repetition } => {
                trace!(block, repetition, "preparation");
                if let Some((inversion, delay)) = &intervals.preparation {
                    inversion.then(delay).then(Spoil).apply(&mut states)?;
                }
                Stage::Excitation {
                    block,
                    repetition,
                    pulse: 0,
                }
            }

            Stage::Excitation {
                block,
                repetition,
                pulse,
            } => {
                intervals.pulses[pulse].apply(&mut states)?;
                intervals.to_echo.apply(&mut states)?;
                if let Some((to_echo, _)) = &intervals.precession {
                    to_echo.apply(&mut states)?;
                }

                if repetition + 1 == plan.repetitions {
                    let receiver = plan.phases.as_ref().map(|phases| T::from_f64(phases[pulse]));
                    let sample = context.observation.observe(&states, receiver)?;
                    signal.row_mut(block * npulses + pulse).assign(&sample);
                }

                intervals.to_next.apply(&mut states)?;
                if let Some((_, to_next)) = &intervals.precession {
                    to_next.apply(&mut states)?;
                }
                dephase(plan.readout, &intervals, &mut states)?;

                next(plan, block, repetition, pulse)
            }

            Stage::Done => break,
        };

        if let Stage::Preparation {
            block,
            repetition: 0,
        } = stage
        {
            if let Some(recovery) = &intervals.recovery {
                trace!(block, "recovery before next inversion");
                recovery.apply(&mut states)?;
            }
        }
    }

    post_process(plan, context, &mut signal)?;
    Ok(Trace {
        signal,
        truncations: states.truncations(),
    })
}

/// Advances the loop after one excitation.
fn next(plan: &Plan, block: usize, repetition: usize, pulse: usize) -> Stage {
    if pulse + 1 < plan.flips.len() {
        Stage::Excitation {
            block,
            repetition,
            pulse: pulse + 1,
        }
    } else if repetition + 1 < plan.repetitions {
        Stage::Preparation {
            block,
            repetition: repetition + 1,
        }
    } else if block + 1 < plan.blocks {
        Stage::Preparation {
            block: block + 1,
            repetition: 0,
        }
    } else {
        Stage::Done
    }
}

fn dephase<T: Real>(
    readout: Readout,
    intervals: &Intervals<T>,
    states: &mut States<T>,
) -> Result<(), ShapeError> {
    if let Some(diffusion) = &intervals.diffusion {
        diffusion.apply(states)?;
    }
    if let Some(flow) = &intervals.flow {
        flow.apply(states)?;
    }
    match readout {
        Readout::Shift => Shift::Forward.apply(states),
        Readout::Spoil => Spoil.apply(states),
        Readout::Balanced => Ok(()),
    }
}

/// Weights the recorded signal by the decay and phase accrued at the echo.
///
/// Balanced sequences already carry off-resonance in the states, so only
/// the reversible decay is applied to them.
fn post_process<T: Real>(
    plan: &Plan,
    context: &Context<T>,
    signal: &mut Array2<Complex<T>>,
) -> Result<(), ShapeError> {
    let frequency = match plan.readout {
        Readout::Balanced => Array1::from_elem(context.layout.lanes(), T::zero()),
        Readout::Shift | Readout::Spoil => context.offresonance.clone(),
    };
    Susceptibility::new(&context.r2prime, &frequency, context.timing.te).apply_to(signal)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::angle::degree;
    use uom::si::f64::{Angle, Time};
    use uom::si::time::millisecond;

    use crate::context::Batch;
    use crate::{
        FingerprintingConfig, MprageConfig, Sequence, SpgrConfig, TissueParameters, Train,
    };

    // --- Test fixtures ---

    fn ms(value: f64) -> Time {
        Time::new::<millisecond>(value)
    }

    fn simulate(sequence: &Sequence, tissue: &TissueParameters) -> Trace<f64> {
        let plan = sequence.plan();
        let batch = Batch::new(tissue).expect("broadcasts");
        let context = Context::new(tissue.model(), &batch, &plan, 10, 0..tissue.lanes(), None)
            .expect("valid context");
        run(&plan, &context).expect("should run")
    }

    #[test]
    fn stage_order() {
        let train = Train::constant(Angle::new::<degree>(5.0), 2, ms(5.0)).expect("valid train");
        let mut plan = SpgrConfig::new(train).plan();
        plan.repetitions = 2;
        plan.blocks = 2;

        assert_eq!(
            next(&plan, 0, 0, 0),
            Stage::Excitation {
                block: 0,
                repetition: 0,
                pulse: 1
            }
        );
        assert_eq!(
            next(&plan, 0, 0, 1),
            Stage::Preparation {
                block: 0,
                repetition: 1
            }
        );
        assert_eq!(
            next(&plan, 0, 1, 1),
            Stage::Preparation {
                block: 1,
                repetition: 0
            }
        );
        assert_eq!(next(&plan, 1, 1, 1), Stage::Done);
    }

    #[test]
    fn first_pulse_from_equilibrium() {
        let tissue = TissueParameters::builder(1000.0, 100.0).build().expect("valid tissue");
        let train = Train::constant(Angle::new::<degree>(90.0), 3, ms(10.0)).expect("valid train");
        let trace = simulate(&SpgrConfig::new(train).into(), &tissue);

        // A 90° pulse about x tips Z = 1 onto -y.
        assert_relative_eq!(trace.signal[[0, 0]].re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(trace.signal[[0, 0]].im, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn inversion_flips_the_first_echo() {
        let tissue = TissueParameters::builder(1000.0, 100.0).build().expect("valid tissue");
        let train = Train::constant(Angle::new::<degree>(90.0), 2, ms(10.0)).expect("valid train");
        let sequence = FingerprintingConfig::new(train)
            .with_inversion(ms(0.0))
            .expect("valid TI");
        let trace = simulate(&sequence.into(), &tissue);

        assert_relative_eq!(trace.signal[[0, 0]].im, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn every_repetition_is_prepared() {
        let tissue = TissueParameters::builder(1000.0, 100.0).build().expect("valid tissue");
        let train = Train::constant(Angle::new::<degree>(90.0), 1, ms(10.0)).expect("valid train");
        let sequence = FingerprintingConfig::new(train)
            .with_inversion(ms(0.0))
            .expect("valid TI")
            .with_repetitions(2)
            .expect("valid repetitions");
        let trace = simulate(&sequence.into(), &tissue);

        // The second pass inverts the 1 - E1 regrown during the first.
        let regrown = 1.0 - (-10.0_f64 / 1000.0).exp();
        assert_relative_eq!(trace.signal[[0, 0]].im, regrown, max_relative = 1e-9);
        assert_relative_eq!(trace.signal[[0, 0]].re, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn repeated_blocks_are_recorded() {
        let tissue = TissueParameters::builder(800.0, 60.0).build().expect("valid tissue");
        let train = Train::constant(Angle::new::<degree>(10.0), 20, ms(8.0)).expect("valid train");
        let sequence = MprageConfig::new(train, ms(300.0))
            .expect("valid TI")
            .with_inversions(3, ms(1500.0))
            .expect("block fits");
        let trace = simulate(&sequence.into(), &tissue);

        assert_eq!(trace.signal.nrows(), 60);
        // Every block is recorded and nothing is left at zero.
        assert!(trace.signal.iter().all(|s| s.norm() > 0.0));
        // Recovery before the second inversion is incomplete, so later blocks differ.
        assert!((trace.signal[[0, 0]] - trace.signal[[20, 0]]).norm() > 1e-6);
    }
}
