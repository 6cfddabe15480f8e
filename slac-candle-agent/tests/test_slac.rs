use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use slac_candle_agent::{
    latent::LatentModelConfig,
    mlp::{Mlp, Mlp2, MlpConfig},
    slac::{GaussianActorConfig, Slac, SlacConfig, TwinnedCriticConfig},
};
use slac_core::{
    dummy::{DummyEnv, DummyEnvConfig},
    error::SlacError,
    record::BufferedRecorder,
    sequence_buffer::SequenceBufferConfig,
    window::ObservationWindow,
    Agent, Env,
};
use tempdir::TempDir;

type SlacAgent = Slac<Mlp, Mlp2>;

const IMAGE_SHAPE: [usize; 3] = [1, 64, 64];
const TACTILE_DIM: usize = 2;
const ACTION_DIM: usize = 2;
const NUM_SEQUENCES: usize = 2;

fn config(history_dir: &TempDir) -> SlacConfig<Mlp, Mlp2> {
    let latent_config = LatentModelConfig::default()
        .image_shape(IMAGE_SHAPE)
        .tactile_dim(TACTILE_DIM)
        .action_dim(ACTION_DIM)
        .img_feature_dim(8)
        .tactile_feature_dim(4)
        .z1_dim(4)
        .z2_dim(6)
        .hidden_units(vec![16]);
    let buffer_config = SequenceBufferConfig::default()
        .capacity(200)
        .num_sequences(NUM_SEQUENCES)
        .image_shape(IMAGE_SHAPE)
        .tactile_dim(TACTILE_DIM)
        .action_dim(ACTION_DIM);
    let config = SlacConfig::<Mlp, Mlp2>::default()
        .latent_config(latent_config)
        .buffer_config(buffer_config)
        .batch_size_latent(4)
        .batch_size_sac(4)
        .log_interval(1)
        .history_dir(history_dir.path().to_string_lossy());
    let fa_dim = config.feature_action_dim();
    let z_dim = 4 + 6;

    config
        .actor_config(GaussianActorConfig::default().policy_config(MlpConfig::new(
            fa_dim,
            vec![16],
            ACTION_DIM,
            false,
        )))
        .critic_config(TwinnedCriticConfig::default().q_config(MlpConfig::new(
            z_dim + ACTION_DIM,
            vec![16],
            1,
            false,
        )))
}

fn env() -> Result<DummyEnv> {
    let config = DummyEnvConfig::default()
        .image_shape(IMAGE_SHAPE)
        .tactile_dim(TACTILE_DIM)
        .action_dim(ACTION_DIM + 1)
        .max_episode_steps(10);
    DummyEnv::build(&config, 0)
}

/// Fills the buffer with random transitions and returns the window.
fn collect(agent: &mut SlacAgent, env: &mut DummyEnv, n: usize) -> Result<ObservationWindow> {
    let mut window = Agent::<DummyEnv>::buffer(agent).observation_window();
    agent.reset_episode(env, &mut window)?;
    let mut t = 0;
    for _ in 0..n {
        t = agent.step(env, &mut window, t, true)?;
    }
    Ok(window)
}

#[test]
fn test_updates() -> Result<()> {
    let dir = TempDir::new("slac")?;
    let mut agent = SlacAgent::build(config(&dir))?;
    let mut env = env()?;
    let mut recorder = BufferedRecorder::new();
    collect(&mut agent, &mut env, 30)?;
    assert!(Agent::<DummyEnv>::is_ready(&agent));

    for _ in 0..2 {
        Agent::<DummyEnv>::update_latent(&mut agent, &mut recorder)?;
        Agent::<DummyEnv>::update_sac(&mut agent, &mut recorder)?;
    }

    assert_eq!(agent.learning_steps_latent(), 2);
    assert_eq!(agent.learning_steps_sac(), 2);
    assert_eq!(recorder.steps_of("loss/kld"), vec![1, 2]);
    assert_eq!(recorder.steps_of("loss/critic"), vec![1, 2]);
    for (_, record) in recorder.iter() {
        if let Ok(alpha) = record.get_scalar("stats/alpha") {
            assert!(alpha > 0.0);
        }
        if let Ok(loss) = record.get_scalar("loss/image") {
            assert!(loss.is_finite());
        }
    }

    // Episodes of 10 steps
    assert_eq!(Agent::<DummyEnv>::history(&agent).episodes, 3);
    assert_eq!(Agent::<DummyEnv>::history(&agent).steps_record, vec![10, 20, 30]);
    assert!(dir.path().join("steps_record.json").is_file());
    Ok(())
}

#[test]
fn test_actions_are_bounded() -> Result<()> {
    let dir = TempDir::new("slac")?;
    let mut agent = SlacAgent::build(config(&dir))?;
    let mut env = env()?;
    let window = collect(&mut agent, &mut env, 5)?;

    for _ in 0..10 {
        let action = Agent::<DummyEnv>::explore(&mut agent, &window)?;
        assert_eq!(action.len(), ACTION_DIM);
        assert!(action.iter().all(|a| a.abs() <= 1.0));
    }
    let action = Agent::<DummyEnv>::exploit(&mut agent, &window)?;
    assert_eq!(action.len(), ACTION_DIM);
    assert!(action.iter().all(|a| a.abs() <= 1.0));

    // The extra slot of the environment is filled
    let env_action = Agent::<DummyEnv>::env_action(&agent, &action);
    assert_eq!(env_action.len(), ACTION_DIM + 1);
    assert_eq!(env_action[ACTION_DIM], -0.3);
    Ok(())
}

#[test]
fn test_critic_target_on_terminal_is_reward() -> Result<()> {
    let dir = TempDir::new("slac")?;
    let config = config(&dir);
    let fa_dim = config.feature_action_dim();
    let agent = SlacAgent::build(config)?;
    let dev = Device::Cpu;

    let reward = Tensor::from_slice(&[0.5f32, -1.0, 2.0], (3, 1), &dev)?;
    let next_z = Tensor::randn(0f32, 1.0, (3, 10), &dev)?;
    let next_fa = Tensor::randn(0f32, 1.0, (3, fa_dim), &dev)?;

    let ones = Tensor::ones((3, 1), DType::F32, &dev)?;
    let zeros = Tensor::zeros((3, 1), DType::F32, &dev)?;

    // Terminated
    let target = agent.critic_target(&reward, &ones, &ones, &next_z, &next_fa)?;
    assert_eq!(target.to_vec2::<f32>()?, vec![vec![0.5], vec![-1.0], vec![2.0]]);

    // Truncated by the step limit, not bootstrapped by default
    let target = agent.critic_target(&reward, &ones, &zeros, &next_z, &next_fa)?;
    assert_eq!(target.to_vec2::<f32>()?, vec![vec![0.5], vec![-1.0], vec![2.0]]);

    let target = agent.critic_target(&reward, &zeros, &zeros, &next_z, &next_fa)?;
    assert_eq!(target.dims(), &[3, 1]);
    assert!(target.sum_all()?.to_scalar::<f32>()?.is_finite());
    Ok(())
}

#[test]
fn test_bootstrap_on_truncation() -> Result<()> {
    let dir = TempDir::new("slac")?;
    let config = config(&dir).bootstrap_on_truncation(true);
    let fa_dim = config.feature_action_dim();
    let mut agent = SlacAgent::build(config)?;
    let dev = Device::Cpu;

    let reward = Tensor::from_slice(&[0.5f32, -1.0, 2.0], (3, 1), &dev)?;
    let next_z = Tensor::randn(0f32, 1.0, (3, 10), &dev)?;
    let next_fa = Tensor::randn(0f32, 1.0, (3, fa_dim), &dev)?;
    let ones = Tensor::ones((3, 1), DType::F32, &dev)?;
    let zeros = Tensor::zeros((3, 1), DType::F32, &dev)?;

    // Truncated: done but not masked, the next value is kept
    let target = agent.critic_target(&reward, &ones, &zeros, &next_z, &next_fa)?;
    let bootstrap = (target - &reward)?.abs()?.to_vec2::<f32>()?;
    assert!(bootstrap.iter().all(|v| v[0] > 0.0));

    // Terminated: masked, the target is the reward
    let target = agent.critic_target(&reward, &ones, &ones, &next_z, &next_fa)?;
    assert_eq!(target.to_vec2::<f32>()?, vec![vec![0.5], vec![-1.0], vec![2.0]]);

    // Updates on episodes ending by the step limit run
    let mut env = env()?;
    let mut recorder = BufferedRecorder::new();
    collect(&mut agent, &mut env, 30)?;
    Agent::<DummyEnv>::update_sac(&mut agent, &mut recorder)?;
    let loss = recorder.iter().last().unwrap().1.get_scalar("loss/critic")?;
    assert!(loss.is_finite());
    Ok(())
}

#[test]
fn test_default_target_entropy() -> Result<()> {
    let dir = TempDir::new("slac")?;
    let agent = SlacAgent::build(config(&dir))?;
    assert_eq!(agent.ent_coef().target_entropy(), Some(-(ACTION_DIM as f64)));
    Ok(())
}

#[test]
fn test_save_and_load() -> Result<()> {
    let dir = TempDir::new("slac")?;
    let model_dir = dir.path().join("model");
    let mut agent1 = SlacAgent::build(config(&dir))?;
    let mut agent2 = SlacAgent::build(config(&dir))?;
    let mut env = env()?;
    let window = collect(&mut agent1, &mut env, 5)?;

    Agent::<DummyEnv>::save_params(&agent1, &model_dir)?;
    for file in ["encoder", "latent", "actor", "critic"] {
        assert!(model_dir.join(format!("{}.safetensors", file)).is_file());
    }
    Agent::<DummyEnv>::load_params(&mut agent2, &model_dir)?;

    let a1 = Agent::<DummyEnv>::exploit(&mut agent1, &window)?;
    let a2 = Agent::<DummyEnv>::exploit(&mut agent2, &window)?;
    assert_eq!(a1, a2);
    Ok(())
}

#[test]
fn test_invalid_config() -> Result<()> {
    let dir = TempDir::new("slac")?;
    let mut config = config(&dir);
    config.buffer_config.num_sequences = 1;
    let err = SlacAgent::build(config).err().expect("num_sequences = 1 is rejected");
    assert!(matches!(
        err.downcast_ref::<SlacError>(),
        Some(SlacError::InvalidConfig(_))
    ));
    Ok(())
}
