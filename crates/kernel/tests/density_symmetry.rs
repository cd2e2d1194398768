//! Density symmetry for isolated pairs.
//!
//! Two particles alone within a smoothing radius must see the same density:
//! their own self-contribution plus the shared pair term.

use fluid_kernel::{FluidKernel, FluidParams, KernelCoefficients, PassKind, SimulationKernel, SpawnData};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const DENSITY_PASSES: [PassKind; 5] = [
    PassKind::ExternalForces,
    PassKind::SpatialHash,
    PassKind::Sort,
    PassKind::BuildOffsets,
    PassKind::Density,
];

fn pair_densities(a: Vec3, b: Vec3, table_size: Option<usize>) -> (glam::Vec2, glam::Vec2) {
    let params = FluidParams {
        gravity: 0.0,
        hash_table_size: table_size,
        ..Default::default()
    };
    let mut kernel = FluidKernel::new(&SpawnData::at_rest(vec![a, b]), params).unwrap();
    for kind in DENSITY_PASSES {
        kernel.run_pass(kind, 1.0 / 60.0);
    }
    (kernel.densities()[0], kernel.densities()[1])
}

#[test]
fn pair_along_axis_is_symmetric() {
    let r = FluidParams::default().smoothing_radius;
    let k = KernelCoefficients::new(r);
    let d = 0.1;
    let (da, db) = pair_densities(Vec3::ZERO, Vec3::new(d, 0.0, 0.0), None);

    assert_eq!(da, db);
    let expected = k.spiky_pow2(0.0) + k.spiky_pow2(d);
    let expected_near = k.spiky_pow3(0.0) + k.spiky_pow3(d);
    assert!((da.x - expected).abs() / expected < 1.0e-5);
    assert!((da.y - expected_near).abs() / expected_near < 1.0e-5);
}

#[test]
fn random_pairs_are_symmetric() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for _ in 0..50 {
        let a = Vec3::new(rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5));
        let dir = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
            .try_normalize()
            .unwrap_or(Vec3::X);
        let b = a + dir * rng.gen_range(0.0..0.19);
        for table in [None, Some(1), Some(7)] {
            let (da, db) = pair_densities(a, b, table);
            assert!((da - db).abs().max_element() <= 1.0e-3 * da.x.max(1.0), "{a} {b} {table:?}: {da} vs {db}");
        }
    }
}

#[test]
fn separated_pair_only_sees_itself() {
    let k = KernelCoefficients::new(FluidParams::default().smoothing_radius);
    let (da, db) = pair_densities(Vec3::ZERO, Vec3::new(0.0, 0.0, 0.5), None);
    assert_eq!(da, db);
    assert!((da.x - k.spiky_pow2(0.0)).abs() < 1.0e-3);
}
