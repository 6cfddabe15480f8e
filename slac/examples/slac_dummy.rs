use anyhow::Result;
use candle_core::Device;
use clap::Parser;
use slac_candle_agent::{
    latent::LatentModelConfig,
    mlp::{Mlp, Mlp2, MlpConfig},
    opt::OptimizerConfig,
    slac::{GaussianActorConfig, Slac, SlacConfig, TwinnedCriticConfig},
};
use slac_core::{
    dummy::{DummyEnv, DummyEnvConfig},
    record::{NullRecorder, Recorder},
    sequence_buffer::SequenceBufferConfig,
    Agent, DefaultEvaluator, Env as _, Evaluator as _, Trainer, TrainerConfig,
};
use slac_tensorboard::TensorboardRecorder;
use std::path::Path;

const IMAGE_SHAPE: [usize; 3] = [3, 64, 64];
const TACTILE_DIM: usize = 6;
const ACTION_DIM: usize = 3;
const MAX_EPISODE_STEPS: usize = 50;
const LR_SAC: f64 = 3e-4;
const LR_LATENT: f64 = 1e-4;
const REPLAY_BUFFER_CAPACITY: usize = 100_000;
const N_EPISODES_PER_EVAL: usize = 5;

type Env = DummyEnv;
type SlacAgent = Slac<Mlp, Mlp2>;
type Evaluator = DefaultEvaluator<Env>;

/// Sizes of a run.
struct Scale {
    num_steps: usize,
    initial_collection_steps: usize,
    initial_learning_steps: usize,
    eval_interval: usize,
    num_sequences: usize,
    batch_size_latent: usize,
    batch_size_sac: usize,
}

impl Scale {
    fn full() -> Self {
        Self {
            num_steps: 200_000,
            initial_collection_steps: 10_000,
            initial_learning_steps: 10_000,
            eval_interval: 10_000,
            num_sequences: 8,
            batch_size_latent: 32,
            batch_size_sac: 256,
        }
    }

    fn tiny() -> Self {
        Self {
            num_steps: 60,
            initial_collection_steps: 40,
            initial_learning_steps: 2,
            eval_interval: 20,
            num_sequences: 2,
            batch_size_latent: 2,
            batch_size_sac: 2,
        }
    }
}

fn env_config() -> DummyEnvConfig {
    DummyEnvConfig::default()
        .image_shape(IMAGE_SHAPE)
        .tactile_dim(TACTILE_DIM)
        .action_dim(ACTION_DIM + 1)
        .max_episode_steps(MAX_EPISODE_STEPS)
}

fn create_agent(scale: &Scale, history_dir: Option<&str>) -> Result<SlacAgent> {
    let device = Device::cuda_if_available(0)?;
    let latent_config = LatentModelConfig::default()
        .image_shape(IMAGE_SHAPE)
        .tactile_dim(TACTILE_DIM)
        .action_dim(ACTION_DIM)
        .opt_config(OptimizerConfig::adam(LR_LATENT));
    let buffer_config = SequenceBufferConfig::default()
        .capacity(REPLAY_BUFFER_CAPACITY)
        .num_sequences(scale.num_sequences)
        .image_shape(IMAGE_SHAPE)
        .tactile_dim(TACTILE_DIM)
        .action_dim(ACTION_DIM);
    let z_dim = latent_config.z_dim();
    let mut config = SlacConfig::<Mlp, Mlp2>::default()
        .latent_config(latent_config)
        .buffer_config(buffer_config)
        .batch_size_latent(scale.batch_size_latent)
        .batch_size_sac(scale.batch_size_sac)
        .device(device);
    if let Some(dir) = history_dir {
        config = config.history_dir(dir);
    }
    let fa_dim = config.feature_action_dim();
    let actor_config = GaussianActorConfig::default()
        .opt_config(OptimizerConfig::default().learning_rate(LR_SAC))
        .policy_config(MlpConfig::new(fa_dim, vec![256, 256], ACTION_DIM, false));
    let critic_config = TwinnedCriticConfig::default()
        .opt_config(OptimizerConfig::default().learning_rate(LR_SAC))
        .q_config(MlpConfig::new(z_dim + ACTION_DIM, vec![256, 256], 1, false));
    let config = config
        .actor_config(actor_config)
        .critic_config(critic_config);

    SlacAgent::build(config)
}

fn create_recorder(model_dir: &str, tensorboard: bool) -> Box<dyn Recorder> {
    match tensorboard {
        true => Box::new(TensorboardRecorder::new(model_dir)),
        false => Box::new(NullRecorder::new()),
    }
}

/// Train/eval SLAC agent in the dummy environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Train SLAC agent, not evaluate
    #[arg(short, long, default_value_t = false)]
    train: bool,

    /// Evaluate SLAC agent from the given directory of parameters
    #[arg(short, long)]
    eval: Option<String>,

    /// Directory of models, logs and the run history
    #[arg(long, default_value = "./slac/examples/model/slac_dummy")]
    model_dir: String,

    /// Do not write TensorBoard logs
    #[arg(long, default_value_t = false)]
    no_tensorboard: bool,
}

fn train(scale: &Scale, model_dir: &str, tensorboard: bool) -> Result<()> {
    let config = TrainerConfig::default()
        .num_steps(scale.num_steps)
        .initial_collection_steps(scale.initial_collection_steps)
        .initial_learning_steps(scale.initial_learning_steps)
        .eval_interval(scale.eval_interval)
        .flush_record_interval(scale.eval_interval)
        .model_dir(model_dir);
    std::fs::create_dir_all(model_dir)?;
    config.save(Path::new(model_dir).join("trainer.yaml"))?;

    let mut trainer = Trainer::build(config);
    let mut env = Env::build(&env_config(), 0)?;
    let mut agent = create_agent(scale, Some(model_dir))?;
    let mut recorder = create_recorder(model_dir, tensorboard);
    let mut evaluator = Evaluator::new(&env_config(), 1, N_EPISODES_PER_EVAL)?;

    trainer.train(&mut agent, &mut env, recorder.as_mut(), &mut evaluator)?;

    Ok(())
}

fn eval(scale: &Scale, n_episodes: usize, params_dir: &str) -> Result<f32> {
    let mut agent = create_agent(scale, None)?;
    Agent::<Env>::load_params(&mut agent, Path::new(params_dir))?;

    let record = Evaluator::new(&env_config(), 2, n_episodes)?.evaluate(&mut agent)?;
    let ret = record.get_scalar("return/test")?;
    log::info!("Return: {:.3}", ret);
    Ok(ret)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let scale = Scale::full();

    match args.eval {
        Some(params_dir) if !args.train => {
            eval(&scale, N_EPISODES_PER_EVAL, &params_dir)?;
        }
        _ => train(&scale, &args.model_dir, !args.no_tensorboard)?,
    }

    Ok(())
}
