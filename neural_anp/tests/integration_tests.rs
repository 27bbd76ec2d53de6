//! End-to-end integration tests.

use burn::backend::{Autodiff, NdArray};
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::Distribution;
use tempfile::TempDir;

use neural_anp::{
    config::{AnpConfig, TrainingConfig},
    data::{GrayImage, PixelGridSampler},
    training::{
        checkpoint_exists, find_latest_checkpoint, load_checkpoint, save_checkpoint, AnpBatch,
        AnpTrainer, CheckpointMetadata,
    },
    AnpError, AnpModel,
};

type TestBackend = NdArray;
type TrainBackend = Autodiff<NdArray>;

fn random<B: Backend>(shape: [usize; 3], device: &B::Device) -> Tensor<B, 3> {
    Tensor::random(shape, Distribution::Uniform(0.0, 1.0), device)
}

fn scenario_config() -> AnpConfig {
    AnpConfig::new(2, 1, vec![16, 16], 8)
        .with_use_deter_path(true)
        .with_use_self_attention(false)
        .with_cross_attention_type("dot".into())
}

fn stripes(width: usize, height: usize, phase: usize) -> GrayImage {
    let pixels = (0..width * height)
        .map(|i| if (i / width + phase) % 2 == 0 { 1.0 } else { 0.0 })
        .collect();
    GrayImage::new(width, height, pixels).unwrap()
}

#[test]
fn test_every_attention_combination_runs() {
    let device = Default::default();

    for self_type in ["uniform", "laplace", "dot", "multihead"] {
        for cross_type in ["uniform", "laplace", "dot", "multihead"] {
            let model = scenario_config()
                .with_use_self_attention(true)
                .with_self_attention_type(self_type.into())
                .with_cross_attention_type(cross_type.into())
                .with_num_heads(2)
                .init::<TestBackend>(&device)
                .unwrap();

            let out = model
                .forward(
                    random([2, 5, 2], &device),
                    random([2, 5, 1], &device),
                    random([2, 10, 2], &device),
                    Some(random([2, 10, 1], &device)),
                )
                .unwrap();

            assert_eq!(out.mean.dims(), [2, 10, 1], "{self_type}/{cross_type}");
            let loss = out.loss_value().unwrap();
            assert!(loss.is_finite(), "{self_type}/{cross_type}: loss {loss}");
        }
    }
}

#[test]
fn test_predictive_std_bounds() {
    let device = Default::default();
    let model = scenario_config().init::<TestBackend>(&device).unwrap();

    let scale = |t: Tensor<TestBackend, 3>| t.mul_scalar(40.0).sub_scalar(20.0);
    let out = model
        .forward(
            scale(random([3, 6, 2], &device)),
            scale(random([3, 6, 1], &device)),
            scale(random([3, 12, 2], &device)),
            None,
        )
        .unwrap();

    let std: Vec<f32> = out.stddev.into_data().to_vec().unwrap();
    assert!(std.iter().all(|&s| (0.1 - 1e-6..=1.0).contains(&s)));
}

#[test]
fn test_batch_instances_are_independent() {
    let device = Default::default();
    let model = scenario_config().init::<TestBackend>(&device).unwrap();

    let context_x = random([2, 5, 2], &device);
    let context_y = random([2, 5, 1], &device);
    let target_x = random([2, 10, 2], &device);

    let joint = model
        .forward(context_x.clone(), context_y.clone(), target_x.clone(), None)
        .unwrap();
    let first = model
        .forward(
            context_x.slice([0..1, 0..5, 0..2]),
            context_y.slice([0..1, 0..5, 0..1]),
            target_x.slice([0..1, 0..10, 0..2]),
            None,
        )
        .unwrap();

    let diff: f32 = (joint.mean.slice([0..1, 0..10, 0..1]) - first.mean)
        .abs()
        .max()
        .into_scalar()
        .elem();
    assert!(diff < 1e-5, "Max diff: {}", diff);
}

#[test]
fn test_gradients_are_finite() {
    let device = Default::default();
    let model: AnpModel<TrainBackend> = scenario_config().init(&device).unwrap();

    let context_x = random::<TrainBackend>([2, 5, 2], &device).require_grad();
    let out = model
        .forward(
            context_x.clone(),
            random([2, 5, 1], &device),
            random([2, 10, 2], &device),
            Some(random([2, 10, 1], &device)),
        )
        .unwrap();

    let grads = out.loss.unwrap().backward();
    let grad = context_x.grad(&grads).expect("context_x should receive a gradient");
    let values: Vec<f32> = grad.into_data().to_vec().unwrap();
    assert_eq!(values.len(), 2 * 5 * 2);
    assert!(values.iter().all(|g| g.is_finite()));
}

#[test]
fn test_every_parameter_receives_finite_gradient() {
    let device = Default::default();
    let model: AnpModel<TrainBackend> = scenario_config()
        .with_use_self_attention(true)
        .with_self_attention_type("laplace".into())
        .init(&device)
        .unwrap();
    let before = model.parameters().unwrap();

    let out = model
        .forward(
            random([4, 8, 2], &device),
            random([4, 8, 1], &device),
            random([4, 16, 2], &device),
            Some(random([4, 16, 1], &device)),
        )
        .unwrap();
    let grads = GradientsParams::from_grads(out.loss.unwrap().backward(), &model);

    // One plain SGD step moves a tensor exactly where its gradient is nonzero.
    let mut sgd = SgdConfig::new().init::<TrainBackend, AnpModel<TrainBackend>>();
    let stepped = sgd.step(1e-2, model, grads);
    let after = stepped.parameters().unwrap();

    assert_eq!(before.len(), after.len());
    for (name, old) in &before {
        let new = after.get(name).unwrap_or_else(|| panic!("{name} missing after step"));
        assert!(
            new.values.iter().all(|v| v.is_finite()),
            "{name} has non-finite values after the step"
        );
        assert!(
            new.values != old.values,
            "{name} received no gradient"
        );
    }
}

#[test]
fn test_train_checkpoint_resume() {
    let temp_dir = TempDir::new().unwrap();
    let device = Default::default();

    let config = TrainingConfig::new(scenario_config())
        .with_learning_rate(1e-3)
        .with_batch_size(2)
        .with_num_context(6)
        .with_log_interval(2);
    let images: Vec<_> = (0..4).map(|p| stripes(4, 4, p)).collect();

    let optimizer = AdamConfig::new().init::<TrainBackend, AnpModel<TrainBackend>>();
    let mut trainer = AnpTrainer::new(config.clone(), optimizer, &device).unwrap();
    let history = trainer.fit(&images, 4, &device).unwrap();
    assert_eq!(history.len(), 4);

    let checkpoint_dir = temp_dir.path().join("checkpoint_4");
    let avg = trainer.tracker().average_metrics();
    let metadata = CheckpointMetadata::new(1, 4, avg.loss, avg.loss);
    save_checkpoint(&checkpoint_dir, trainer.model(), &config.model, &metadata).unwrap();

    assert!(checkpoint_exists(&checkpoint_dir));
    assert_eq!(find_latest_checkpoint(temp_dir.path()), Some(checkpoint_dir.clone()));

    let (restored, restored_config, restored_metadata) =
        load_checkpoint::<TestBackend>(&checkpoint_dir, &Default::default()).unwrap();
    assert_eq!(restored_config.latent_dim, 8);
    assert_eq!(restored_metadata.total_steps, 4);

    let trained = trainer.valid_model();
    let batch: AnpBatch<TestBackend> = PixelGridSampler::new(99)
        .sample(&images, 2, 6, &Default::default())
        .unwrap();

    let a = trained
        .forward(
            batch.context_x.clone(),
            batch.context_y.clone(),
            batch.target_x.clone(),
            None,
        )
        .unwrap();
    let b = restored
        .forward(batch.context_x, batch.context_y, batch.target_x, None)
        .unwrap();

    let a_mean: Vec<f32> = a.mean.into_data().to_vec().unwrap();
    let b_mean: Vec<f32> = b.mean.into_data().to_vec().unwrap();
    assert_eq!(a_mean, b_mean);
}

#[test]
fn test_loading_into_wrong_architecture_fails() {
    let device = Default::default();
    let small = scenario_config().init::<TestBackend>(&device).unwrap();
    let params = small.parameters().unwrap();

    let mut wider = AnpConfig::new(2, 1, vec![32, 32], 8)
        .with_cross_attention_type("dot".into())
        .init::<TestBackend>(&device)
        .unwrap();
    assert!(matches!(
        wider.load_parameters(&params),
        Err(AnpError::ShapeMismatch { .. })
    ));

    let mut with_rnn = scenario_config()
        .with_use_rnn(true)
        .init::<TestBackend>(&device)
        .unwrap();
    assert!(matches!(
        with_rnn.load_parameters(&params),
        Err(AnpError::MissingParameter { .. })
    ));
}
