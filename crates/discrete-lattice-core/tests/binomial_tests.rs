use discrete_lattice_core::binomial::pricing::{price_european_option, BinomialOptionInput};
use discrete_lattice_core::binomial::{BinomialModel, BinomialModelParams};
use discrete_lattice_core::{LatticeError, OptionType};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn approx_eq(a: Decimal, b: Decimal, tol: Decimal) -> bool {
    (a - b).abs() < tol
}

fn model(s0: Decimal, u: Decimal, d: Decimal, rate: Decimal, periods: u32) -> BinomialModel {
    BinomialModel::new(s0, u, d, dec!(0.5), dec!(0.5), rate, periods).unwrap()
}

// ===========================================================================
// Reference values
// ===========================================================================

#[test]
fn test_zero_period_call() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), 0);
    let value = m.european_option_evaluate(true.into(), dec!(90)).unwrap();
    assert_eq!(value, dec!(10));
}

#[test]
fn test_one_period_risk_neutral_and_call() {
    let m = model(dec!(100), dec!(1.2), dec!(0.8), dec!(0), 1);
    let (pi_u, pi_d) = m.risk_neutral();
    assert_eq!(pi_u + pi_d, Decimal::ONE);
    assert_eq!(pi_u * dec!(1.2) + pi_d * dec!(0.8), Decimal::ONE);

    for k in [dec!(85), dec!(100), dec!(110)] {
        let expected = (pi_u * (dec!(120) - k).max(Decimal::ZERO)
            + pi_d * (dec!(80) - k).max(Decimal::ZERO))
            / Decimal::ONE;
        let value = m.european_option_evaluate(OptionType::Call, k).unwrap();
        assert_eq!(value, expected, "K={k}");
    }
}

#[test]
fn test_two_period_textbook_put() {
    // Hull: S0=50, u=1.2, d=0.8, r=5% per period (simple), K=52
    // π_u = (1.05 - 0.8) / 0.4 = 0.625
    // put payoffs: uu=72 -> 0, ud=48 -> 4, dd=32 -> 20
    // P = (2·0.625·0.375·4 + 0.375²·20) / 1.05²
    let m = model(dec!(50), dec!(1.2), dec!(0.8), dec!(0.05), 2);
    let value = m.european_option_evaluate(OptionType::Put, dec!(52)).unwrap();
    let expected = (dec!(2) * dec!(0.625) * dec!(0.375) * dec!(4)
        + dec!(0.375) * dec!(0.375) * dec!(20))
        / (dec!(1.05) * dec!(1.05));
    assert!(approx_eq(value, expected, dec!(0.0000000001)));
}

#[test]
fn test_convolution_and_lattice_agree_deep_tree() {
    // integer node prices 100·2^k, so every path recombines exactly
    let m = model(dec!(100), dec!(2), dec!(1), dec!(0.5), 25);
    for option_type in [OptionType::Call, OptionType::Put] {
        let a = m.european_option_evaluate(option_type, dec!(500000)).unwrap();
        let b = m.european_option_evaluate_lattice(option_type, dec!(500000)).unwrap();
        assert!(approx_eq(a, b, dec!(0.000001)), "{option_type:?}: {a} vs {b}");
    }
    assert_eq!(m.terminal_distribution().unwrap().len(), 26);
}

#[test]
fn test_deep_tree_recombines_with_fractional_factors() {
    for periods in [14, 18, 22, 30] {
        let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), periods);
        assert_eq!(m.terminal_distribution().unwrap().len(), periods as usize + 1);
    }
    let m = BinomialModel::new(
        dec!(100.5),
        dec!(1.1234567891),
        dec!(0.8765432109),
        dec!(0.5),
        dec!(0.5),
        dec!(0.05),
        12,
    )
    .unwrap();
    assert_eq!(m.terminal_distribution().unwrap().len(), 13);
}

#[test]
fn test_long_tree_prices_agree() {
    let m = model(dec!(100), dec!(1.01), dec!(0.99), dec!(0.001), 200);
    let a = m.european_option_evaluate(OptionType::Call, dec!(100)).unwrap();
    let b = m.european_option_evaluate_lattice(OptionType::Call, dec!(100)).unwrap();
    assert!(approx_eq(a, b, dec!(0.000001)), "{a} vs {b}");
    assert_eq!(m.terminal_distribution().unwrap().len(), 201);
}

#[test]
fn test_put_call_parity_across_strikes() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.02), 8);
    let growth = (0..8).fold(Decimal::ONE, |acc, _| acc * dec!(1.02));
    for k in [dec!(70), dec!(95), dec!(100), dec!(130)] {
        let c = m.european_option_evaluate(OptionType::Call, k).unwrap();
        let p = m.european_option_evaluate(OptionType::Put, k).unwrap();
        assert!(approx_eq(c - p, dec!(100) - k / growth, dec!(0.000001)), "K={k}");
    }
}

// ===========================================================================
// Delta
// ===========================================================================

#[test]
fn test_delta_precondition() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), 0);
    assert!(matches!(
        m.delta(OptionType::Call, dec!(100)),
        Err(LatticeError::PreconditionViolation(_))
    ));
}

#[test]
fn test_delta_matches_finite_difference_of_sub_trees() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), 4);
    let up = model(dec!(110), dec!(1.1), dec!(0.9), dec!(0.05), 3);
    let down = model(dec!(90), dec!(1.1), dec!(0.9), dec!(0.05), 3);
    let k = dec!(100);
    let expected = (up.european_option_evaluate(OptionType::Call, k).unwrap()
        - down.european_option_evaluate(OptionType::Call, k).unwrap())
        / dec!(20);
    assert_eq!(m.delta(OptionType::Call, k).unwrap(), expected);
}

#[test]
fn test_deep_itm_call_delta_is_one() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), 2);
    let delta = m.delta(OptionType::Call, dec!(10)).unwrap();
    assert!(approx_eq(delta, Decimal::ONE, dec!(0.0000000001)));
}

#[test]
fn test_deep_otm_call_delta_is_zero() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), 2);
    assert_eq!(m.delta(OptionType::Call, dec!(500)).unwrap(), Decimal::ZERO);
}

// ===========================================================================
// Construction errors
// ===========================================================================

#[test]
fn test_arbitrage_violations() {
    // 1 + r <= d
    let low = BinomialModel::new(
        dec!(100),
        dec!(1.2),
        dec!(0.95),
        dec!(0.5),
        dec!(0.5),
        dec!(-0.1),
        1,
    );
    assert!(matches!(low, Err(LatticeError::ArbitrageViolation { .. })));
    // 1 + r == u
    let edge = BinomialModel::new(
        dec!(100),
        dec!(1.1),
        dec!(0.9),
        dec!(0.5),
        dec!(0.5),
        dec!(0.1),
        1,
    );
    assert!(matches!(edge, Err(LatticeError::ArbitrageViolation { .. })));
}

#[test]
fn test_equal_factors_rejected() {
    let err = BinomialModel::new(
        dec!(100),
        dec!(1),
        dec!(1),
        dec!(0.5),
        dec!(0.5),
        dec!(0),
        1,
    )
    .unwrap_err();
    assert!(matches!(err, LatticeError::InvalidInput { .. }));
}

// ===========================================================================
// Path sampling
// ===========================================================================

#[test]
fn test_paths_are_reproducible_with_seed() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), 10);
    let a = m.pick(&mut StdRng::seed_from_u64(3)).unwrap();
    let b = m.pick(&mut StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 11);
}

#[test]
fn test_path_terminal_is_lattice_node() {
    let m = model(dec!(100), dec!(1.1), dec!(0.9), dec!(0.05), 6);
    let terminal = m.terminal_distribution_real_world().unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..200 {
        let path = m.pick(&mut rng).unwrap();
        assert!(terminal.probability_of(path[6]) > Decimal::ZERO);
    }
}

#[test]
fn test_path_overflow_is_an_error() {
    // every move is up: 100·1.1^800 exceeds the Decimal range
    let m = BinomialModel::new(
        dec!(100),
        dec!(1.1),
        dec!(0.9),
        dec!(1),
        dec!(0),
        dec!(0.05),
        800,
    )
    .unwrap();
    let result = m.pick(&mut StdRng::seed_from_u64(9));
    assert!(matches!(result, Err(LatticeError::ArithmeticOverflow { .. })));
}

// ===========================================================================
// Pricing envelope
// ===========================================================================

#[test]
fn test_price_european_option_envelope() {
    let input = BinomialOptionInput {
        model: BinomialModelParams {
            spot_price: dec!(50),
            up_factor: dec!(1.2),
            down_factor: dec!(0.8),
            up_probability: dec!(0.7),
            down_probability: dec!(0.3),
            risk_free_rate: dec!(0.05),
            periods: 2,
        },
        strike_price: dec!(52),
        option_type: OptionType::Put,
    };
    let out = price_european_option(&input).unwrap();
    assert_eq!(out.methodology, "Binomial Tree (risk-neutral convolution)");
    assert_eq!(out.result.terminal_outcomes, 3);
    assert_eq!(out.result.intrinsic_value, dec!(2));
    assert!(out.result.delta.unwrap() < Decimal::ZERO);
    assert!(approx_eq(out.result.price, out.result.lattice_price, dec!(0.00000001)));
}

#[cfg(feature = "simulation")]
#[test]
fn test_path_simulation_envelope() {
    use discrete_lattice_core::simulation::paths::{run_path_simulation, PathSimulationInput};

    let input = PathSimulationInput {
        model: BinomialModelParams {
            spot_price: dec!(100),
            up_factor: dec!(1.1),
            down_factor: dec!(0.9),
            up_probability: dec!(0.5),
            down_probability: dec!(0.5),
            risk_free_rate: dec!(0.05),
            periods: 3,
        },
        num_paths: 5_000,
        seed: Some(42),
    };
    let out = run_path_simulation(&input).unwrap();
    assert_eq!(out.result.outcome_frequencies.len(), 4);
    assert!((out.result.analytical_mean - 100.0).abs() < 1e-9);
}
