//! # Example: Two demes
//!
//! One lineage starts in deme 0 and migrates symmetrically at rate 0.1.
//! A second run adds another lineage in the same deme, so the trailing
//! log-normalization entry picks up the probability of not coalescing.
//!

use lineage_ode::prelude::*;

fn main() {
    let migration = [0.0, 0.1, 0.1, 0.0];
    let coalescent = [1.0, 1.0];

    let mut integrator = Integrator::setup(2, 2, Settings::new(1e-6, 0.1)).unwrap();

    let mut p = [1.0, 0.0, 0.0];
    let stats = integrator
        .init_and_calculate_values(&migration, &coalescent, 1, 1.0, &mut p)
        .unwrap();
    println!("one lineage:  p = {:?}", p);
    println!("              accepted = {}, rejected = {}", stats.naccpt, stats.nrejct);

    let mut p = [1.0, 0.0, 1.0, 0.0, 0.0];
    let mut printer = |_: Float, t: Float, p: &[Float], _: Float| {
        if (t * 10.0).fract() < 1e-9 {
            println!("t = {:.1}, p = {:?}", t, p);
        }
    };
    integrator.init(&migration, &coalescent, 2).unwrap();
    integrator
        .calculate_values_observed(1.0, &mut p, &mut printer)
        .unwrap();
    println!("two lineages: p = {:?}", p);
    println!("              P(no coalescence) = {:.6}", p[4].exp());
}
