//! # Example: Rate shifts
//!
//! Three epochs with increasing migration between three demes. The span
//! from t = 0.5 to t = 3.0 crosses two epoch boundaries.
//!

use lineage_ode::prelude::*;

fn main() {
    let states = 3;
    let mut migration = Vec::new();
    let mut coalescent = Vec::new();
    for epoch in 0..3 {
        let m = 0.05 * (epoch + 1) as Float;
        for from in 0..states {
            for to in 0..states {
                migration.push(if from == to { 0.0 } else { m });
            }
        }
        coalescent.extend([1.0, 0.5, 2.0]);
    }
    let end_times = [1.0, 2.0, 10.0];

    let mut integrator = Integrator::setup(3, states, Settings::new(1e-7, 0.25)).unwrap();
    integrator.set_up_dynamics(&migration, &coalescent, &end_times).unwrap();

    let mut p = vec![0.0; states * 3 + 1];
    p[0] = 1.0;
    p[4] = 1.0;
    p[8] = 1.0;

    let stats = integrator
        .calculate_values_through_schedule(0.5, 3, 2.5, &mut p)
        .unwrap();

    for (i, lin) in p[..9].chunks_exact(states).enumerate() {
        println!("lineage {}: {:?}", i, lin);
    }
    println!("log P(no coalescence) = {:.6}", p[9]);
    println!("steps: {} accepted, {} rejected", stats.naccpt, stats.nrejct);

    // Epochs past the end reuse the last epoch's rates.
    let last = integrator.rates_for_epoch(2).unwrap();
    let clamped = integrator.rates_for_epoch(7).unwrap();
    assert_eq!(last, clamped);
}
