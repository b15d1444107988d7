use approx::assert_relative_eq;

use ferrite_bench::data::images::Layout;
use ferrite_bench::datasets::{DataKind, Dataset, DatasetSource, Framework, SimulatedDataset};
use ferrite_bench::BenchError;

fn simulated(framework: Framework) -> SimulatedDataset {
    SimulatedDataset { n_samples: 128, img_size: 32, train_frac: 0.8, ..SimulatedDataset::default() }
        .with_framework(framework.as_str())
        .unwrap()
}

#[test]
fn simulated_split_is_the_same_for_both_engines() {
    for framework in Framework::ALL {
        let (kind, payload) = simulated(framework).get_data().unwrap();
        assert_eq!(kind, DataKind::Object);
        assert_eq!(payload.framework, framework);
        assert_eq!(payload.description.n_samples_train, 102);
        assert_eq!(payload.description.n_samples_test, 26);
        assert_eq!(payload.description.image_width, 32);
        assert_eq!(payload.description.n_classes, 2);
        assert_eq!(payload.dataset.len(), 102);
        assert_eq!(payload.test_dataset.len(), 26);
    }
}

#[test]
fn containers_are_native_to_their_engine() {
    let (_, imperative) = simulated(Framework::Imperative).get_data().unwrap();
    let (_, graph) = simulated(Framework::Graph).get_data().unwrap();
    assert!(matches!(imperative.dataset, Dataset::Tensor(_)));
    assert!(matches!(graph.dataset, Dataset::Slices(_)));
    assert_eq!(imperative.dataset.images().layout(), Layout::ChannelsFirst);
    assert_eq!(graph.dataset.images().layout(), Layout::ChannelsLast);
    assert_eq!(imperative.description, graph.description);
}

#[test]
fn per_channel_means_agree_across_engines() {
    let (_, imperative) = simulated(Framework::Imperative).get_data().unwrap();
    let (_, graph) = simulated(Framework::Graph).get_data().unwrap();
    for i in 0..imperative.dataset.len() {
        let a = imperative.dataset.images().channel_means(i);
        let b = graph.dataset.images().channel_means(i);
        assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(x, y, epsilon = 1e-5);
        }
    }
    assert_eq!(imperative.dataset.labels(), graph.dataset.labels());
    assert_eq!(imperative.test_dataset.labels(), graph.test_dataset.labels());
}

#[test]
fn simulated_pixels_look_standard_normal() {
    let (_, payload) = simulated(Framework::Imperative).get_data().unwrap();
    let images = payload.dataset.images();
    let values: Vec<f64> = (0..images.len()).flat_map(|i| images.sample(i).iter().map(|&x| x as f64)).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    assert!(mean.abs() < 0.02, "mean {mean}");
    assert!((var - 1.0).abs() < 0.05, "variance {var}");
}

#[test]
fn unknown_framework_fails_at_construction() {
    let err = SimulatedDataset::default().with_framework("caffe").unwrap_err();
    assert!(matches!(err, BenchError::UnsupportedFramework(ref name) if name == "caffe"));
    assert_eq!(err.to_string(), "Framework not supported: caffe");
}
