use image::{Rgb, RgbImage};
use shaderloop_core::fakes::stripe_pattern;
use shaderloop_core::{select_frame, RankDirection, ScoreEngine, ScoreWeights};

fn gradient(size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        let v = ((x + y) * 255 / (2 * size - 2)) as u8;
        Rgb([v, v / 2, 255 - v])
    })
}

fn in_unit_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

#[test]
fn scores_stay_in_unit_range() {
    let engine = ScoreEngine::new(32).expect("engine");
    let images = [
        gradient(32),
        stripe_pattern("one", 32, 32, 0.0),
        stripe_pattern("two", 32, 32, 0.5),
        RgbImage::from_pixel(32, 32, Rgb([255, 255, 255])),
        RgbImage::new(32, 32),
    ];
    for a in &images {
        for b in &images {
            let v = engine.score(a, b, &ScoreWeights::default()).expect("score");
            assert!(in_unit_range(v.frequency()));
            assert!(in_unit_range(v.edge()));
            assert!(in_unit_range(v.texture()));
            assert!(in_unit_range(v.composite));
        }
    }
}

#[test]
fn identical_images_score_exactly_one() {
    let engine = ScoreEngine::default();
    let img = gradient(64);
    let v = engine.score(&img, &img, &ScoreWeights::default()).expect("score");
    assert_eq!(v.composite, 1.0);
    assert_eq!(v.frequency(), 1.0);
    assert_eq!(v.edge(), 1.0);
    assert_eq!(v.texture(), 1.0);
}

#[test]
fn zero_weight_metric_does_not_affect_composite() {
    let engine = ScoreEngine::new(32).expect("engine");
    let a = gradient(32);
    let b = stripe_pattern("other", 32, 32, 0.0);

    let only_freq = engine
        .score(&a, &b, &ScoreWeights::new(2.0, 0.0, 0.0))
        .expect("score");
    assert!((only_freq.composite - only_freq.frequency()).abs() < 1e-12);

    let freq_edge = engine
        .score(&a, &b, &ScoreWeights::new(1.0, 1.0, 0.0))
        .expect("score");
    let expected = (freq_edge.frequency() + freq_edge.edge()) / 2.0;
    assert!((freq_edge.composite - expected).abs() < 1e-12);
}

#[test]
fn weights_are_renormalized_by_their_sum() {
    let engine = ScoreEngine::new(32).expect("engine");
    let a = gradient(32);
    let b = stripe_pattern("other", 32, 32, 0.25);

    let small = engine
        .score(&a, &b, &ScoreWeights::new(0.4, 0.3, 0.3))
        .expect("score");
    let scaled = engine
        .score(&a, &b, &ScoreWeights::new(4.0, 3.0, 3.0))
        .expect("score");
    assert!((small.composite - scaled.composite).abs() < 1e-12);
}

#[test]
fn all_zero_weights_average_equally() {
    let engine = ScoreEngine::new(32).expect("engine");
    let a = gradient(32);
    let b = RgbImage::from_pixel(32, 32, Rgb([10, 200, 30]));
    let v = engine.score(&a, &b, &ScoreWeights::zero()).expect("score");
    let mean = (v.frequency() + v.edge() + v.texture()) / 3.0;
    assert!(v.composite.is_finite());
    assert!((v.composite - mean).abs() < 1e-12);
}

#[test]
fn weight_pairs_accept_aliases_and_reject_unknown() {
    let w = ScoreWeights::from_pairs([("fft", 1.0), ("gram", 0.5)]).expect("weights");
    assert_eq!(w, ScoreWeights::new(1.0, 0.0, 0.5));
    assert!(ScoreWeights::from_pairs([("lpips", 1.0)]).is_err());
    assert!(ScoreWeights::from_pairs([("edge", f64::NAN)]).is_err());
}

#[test]
fn selection_over_engine_scores_prefers_closest_frame() {
    let engine = ScoreEngine::new(32).expect("engine");
    let target = stripe_pattern("shader", 32, 32, 0.0);
    let maps = engine.prepare(&target).expect("prepare");
    let frames = [
        RgbImage::new(32, 32),
        target.clone(),
        stripe_pattern("shader", 32, 32, 0.5),
    ];
    let values = frames
        .iter()
        .map(|f| {
            engine
                .score_prepared(&maps, f, &ScoreWeights::default())
                .ok()
                .map(|v| v.composite)
        })
        .collect();

    let sel = select_frame(values, RankDirection::HigherIsBetter);
    assert_eq!(sel.index, 1);
    assert_eq!(sel.value(), Some(1.0));
}
