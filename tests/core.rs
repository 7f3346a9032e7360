use autocost::backprop::{Batcher, Gradient, Node, NodeRef, Variable};
use autocost::cost::*;
use autocost::ops::{FuncBatcher, Sigmoid, add, mul, pool, scale, sigmoid, sum_all};
use autocost::samples::VectorSample;
use autocost::vector;
use autocost::vector::Vector;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn strategies() -> [(&'static str, &'static dyn CostFunc); 5] {
    [
        ("mean_squared", &MeanSquaredCost),
        ("abs", &AbsCost),
        ("cross_entropy", &CrossEntropyCost),
        ("dot", &DotCost),
        ("sigmoid_cross_entropy", &SigmoidCrossEntropyCost),
    ]
}

/// A constant actual output that counts how often it is read.
struct Counted {
    value: Vector,
    reads: AtomicUsize,
}

impl Counted {
    fn shared(value: Vector) -> Arc<Self> {
        Arc::new(Self { value, reads: AtomicUsize::new(0) })
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Node for Counted {
    fn output(&self) -> &Vector {
        self.reads.fetch_add(1, Ordering::SeqCst);
        &self.value
    }

    fn constant(&self, _grad: &Gradient) -> bool {
        true
    }

    fn propagate_gradient(&self, _upstream: Vector, _grad: &mut Gradient) {}
}

#[test]
fn test_costs_on_known_values() {
    let expected = vector![1.0, 0.0];
    let actual = || Variable::shared(vector![0.8, 0.4]);

    let ms = MeanSquaredCost.cost(&expected, actual()).output()[0];
    assert!((ms - (0.04 + 0.16)).abs() < 1e-12);

    let abs = AbsCost.cost(&expected, actual()).output()[0];
    assert!((abs - 0.6).abs() < 1e-12);

    let ce = CrossEntropyCost.cost(&expected, actual()).output()[0];
    assert!((ce + 0.8f64.ln() + 0.6f64.ln()).abs() < 1e-12);

    let dot = DotCost.cost(&expected, actual()).output()[0];
    assert!((dot + 0.8).abs() < 1e-12);

    let sce = SigmoidCrossEntropyCost.cost(&expected, actual()).output()[0];
    let s = |x: f64| 1.0 / (1.0 + (-x).exp());
    assert!((sce + s(0.8).ln() + (1.0 - s(0.4)).ln()).abs() < 1e-12);
}

#[test]
fn test_distance_costs_vanish_at_target() {
    let target = vector![0.25, -1.5, 3.0];

    let actual = Variable::shared(target.clone());
    let node = MeanSquaredCost.cost(&target, actual.clone());
    assert_eq!(node.output()[0], 0.0);
    let mut grad = Gradient::zeros(&[actual.clone()]);
    node.propagate_gradient(vector![1.0], &mut grad);
    assert_eq!(grad.get(&actual), Some(&Vector::zeros(3)));

    // the sign mask counts a zero difference as positive
    let actual = Variable::shared(target.clone());
    let node = AbsCost.cost(&target, actual.clone());
    assert_eq!(node.output()[0], 0.0);
    let mut grad = Gradient::zeros(&[actual.clone()]);
    node.propagate_gradient(vector![1.0], &mut grad);
    assert_eq!(grad.get(&actual), Some(&vector![1.0, 1.0, 1.0]));
}

#[test]
fn test_cost_through_network_reaches_weights() {
    // a = sigmoid(w * input)
    let weights = Variable::shared(vector![0.5, -0.5]);
    let input = Variable::shared(vector![2.0, 1.0]);
    let actual = sigmoid(mul(weights.clone(), input));

    let cost = SigmoidCrossEntropyCost.cost(&vector![1.0, 0.0], actual);
    let mut grad = Gradient::zeros(&[weights.clone()]);
    cost.propagate_gradient(vector![1.0], &mut grad);

    let g = grad.get(&weights).unwrap();
    assert_eq!(g.len(), 2);
    assert!(g.iter().all(|x| x.is_finite() && *x != 0.0));
}

#[test]
fn test_regularizer_matches_formula() {
    let w = Variable::shared(vector![3.0, 4.0]);
    let cost = RegularizingCost::new(vec![w.clone()], 0.01, DotCost);
    let actual = Variable::shared(vector![1.0, 2.0]);
    let node = cost.cost(&vector![1.0, 1.0], actual.clone());
    // -(1 + 2) + 0.01 * 25
    assert!((node.output()[0] + 2.75).abs() < 1e-12);

    let mut grad = Gradient::zeros(&[w.clone(), actual.clone()]);
    node.propagate_gradient(vector![1.0], &mut grad);
    assert_eq!(grad.get(&actual), Some(&vector![-1.0, -1.0]));
    let gw = grad.get(&w).unwrap();
    assert!((gw[0] - 0.06).abs() < 1e-12 && (gw[1] - 0.08).abs() < 1e-12);
}

#[test]
fn test_cost_node_shared_across_threads() {
    let actual = Variable::shared(vector![0.1, 0.2, 0.3, 0.4]);
    let node: NodeRef = CrossEntropyCost.cost(&vector![0.0, 1.0, 0.0, 1.0], actual);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let node = Arc::clone(&node);
            std::thread::spawn(move || node.output()[0])
        })
        .collect();
    let values: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(values.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(values[0], node.output()[0]);
}

#[test]
fn test_pooled_subexpression_gradient() {
    let x = Variable::shared(vector![1.5]);
    // (x + x) * x = 2x², derivative 4x
    let out = pool(x.clone(), |a| sum_all(mul(add(a.clone(), a.clone()), a)));
    let mut grad = Gradient::zeros(&[x.clone()]);
    out.propagate_gradient(vector![1.0], &mut grad);
    assert_eq!(grad.get(&x), Some(&vector![6.0]));
}

#[test]
fn test_dataset_totals_from_config() {
    let config = CostConfig::from_json(r#"{ "kind": "mean_squared" }"#).unwrap();
    let cost = config.build(Vec::new()).unwrap();

    let samples: Vec<VectorSample> = (0..6)
        .map(|i| {
            let x = f64::from(i) / 10.0;
            VectorSample::new(vector![x, 1.0 - x], vector![0.5, 0.5])
        })
        .collect();

    let layer = FuncBatcher::new(Sigmoid);
    let per_sample = total_cost(cost.as_ref(), &Sigmoid, &samples);
    for batch_size in [0, 1, 4, 6] {
        let batched = total_cost_batcher(cost.as_ref(), &layer, &samples, batch_size);
        assert!((batched - per_sample).abs() < 1e-12);
    }

    // (x/2 - 1/2)² + ((1 - x)/2 - 1/2)² per sample
    let halves = |x: NodeRef| scale(x, 0.5);
    let halved = total_cost(cost.as_ref(), &halves, &samples);
    let want: f64 = (0..6)
        .map(|i| {
            let x = f64::from(i) / 10.0;
            0.25 * (x - 1.0) * (x - 1.0) + 0.25 * x * x
        })
        .sum();
    assert!((halved - want).abs() < 1e-12, "{halved} vs {want}");
}

#[test]
fn test_config_errors() {
    assert!(matches!(
        CostConfig::from_json(r#"{ "kind": "huber" }"#),
        Err(CostError::Json(_))
    ));
    assert!(matches!(
        CostConfig::from_json("not json"),
        Err(CostError::Json(_))
    ));
    assert!(matches!(
        CostConfig::from_json(r#"{ "kind": "dot", "penalty": -0.5 }"#),
        Err(CostError::InvalidPenalty(_))
    ));
    assert!(matches!("softmax".parse::<CostKind>(), Err(CostError::UnknownCost(_))));
}

#[test]
fn test_every_cost_output_is_memoized() {
    let expected = vector![0.0, 1.0, 1.0];
    for (name, cost) in strategies() {
        let actual = Counted::shared(vector![0.3, 0.6, 0.9]);
        let node = cost.cost(&expected, actual.clone());

        let first = node.output();
        let reads = actual.reads();
        let second = node.output();
        assert!(std::ptr::eq(first, second), "{name}: output recomputed");
        assert_eq!(first, second, "{name}");
        assert_eq!(actual.reads(), reads, "{name}: actual read again");

        // a fresh node read from many threads computes exactly once too
        let shared_actual = Counted::shared(vector![0.3, 0.6, 0.9]);
        let shared = cost.cost(&expected, shared_actual.clone());
        let values: Vec<f64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| shared.output()[0])).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(values.iter().all(|&v| v == first[0]), "{name}: {values:?}");
        assert_eq!(shared_actual.reads(), reads, "{name}: concurrent reads");
    }
}

#[test]
fn test_concurrent_backward_passes() {
    let expected = vector![0.0, 1.0, 1.0, 0.0];
    for (name, cost) in strategies() {
        let actual = Variable::shared(vector![0.2, 0.7, 0.4, 0.9]);
        let node = cost.cost(&expected, actual.clone());

        let mut reference = Gradient::zeros(&[actual.clone()]);
        node.propagate_gradient(vector![1.0], &mut reference);
        let want = reference.get(&actual).cloned().unwrap();

        let got: Vec<Vector> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let mut grad = Gradient::zeros(&[actual.clone()]);
                        node.propagate_gradient(vector![1.0], &mut grad);
                        grad.get(&actual).cloned().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(got.iter().all(|g| *g == want), "{name}: {got:?} vs {want:?}");
    }
}

#[test]
fn test_concurrent_batched_backward_passes() {
    let batcher = FuncBatcher::new(Sigmoid);
    let input = Variable::shared(vector![0.5, -1.0, 2.0, 0.0]);
    let node = CrossEntropyCost.cost(&vector![1.0, 0.0, 1.0, 0.0], batcher.batch(input.clone(), 2));

    let mut reference = Gradient::zeros(&[input.clone()]);
    node.propagate_gradient(vector![1.0], &mut reference);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let mut grad = Gradient::zeros(&[input.clone()]);
                node.propagate_gradient(vector![1.0], &mut grad);
                assert_eq!(grad, reference);
            });
        }
    });
}
