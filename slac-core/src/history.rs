//! History of a training run.
use anyhow::Result;
use log::trace;
use serde::{Deserialize, Serialize};
use std::{
    fs::{create_dir_all, File},
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Rewards at the ends of episodes and the step counts at which they ended.
///
/// [`RunHistory::save()`] rewrites `end_rewards.json` and `steps_record.json`
/// in full.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunHistory {
    /// The reward of the last step of each episode.
    pub end_rewards: Vec<f32>,

    /// The total number of environment steps at the end of each episode.
    pub steps_record: Vec<usize>,

    /// The number of finished episodes.
    pub episodes: usize,

    /// The total number of environment steps.
    pub total_steps: usize,

    #[serde(skip)]
    dir: Option<PathBuf>,
}

impl RunHistory {
    /// Creates an empty history saved in the given directory.
    ///
    /// With `None`, files are written in the current directory.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            ..Default::default()
        }
    }

    /// Counts an environment step.
    pub fn on_step(&mut self) {
        self.total_steps += 1;
    }

    /// Records the end of an episode.
    pub fn on_episode_end(&mut self, reward: f32) {
        self.episodes += 1;
        self.end_rewards.push(reward);
        self.steps_record.push(self.total_steps);
    }

    fn path(&self, name: &str) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Writes the history files.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = &self.dir {
            create_dir_all(dir)?;
        }
        let path = self.path("end_rewards.json");
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string(&self.end_rewards)?.as_bytes())?;
        let path = self.path("steps_record.json");
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string(&self.steps_record)?.as_bytes())?;
        trace!("Saved run history to {:?}", self.dir);
        Ok(())
    }

    /// Reads the history files written by [`RunHistory::save()`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let end_rewards: Vec<f32> =
            serde_json::from_reader(BufReader::new(File::open(dir.join("end_rewards.json"))?))?;
        let steps_record: Vec<usize> =
            serde_json::from_reader(BufReader::new(File::open(dir.join("steps_record.json"))?))?;
        Ok(Self {
            episodes: end_rewards.len(),
            total_steps: steps_record.last().copied().unwrap_or(0),
            end_rewards,
            steps_record,
            dir: Some(dir.to_path_buf()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("run_history")?;
        let mut history = RunHistory::new(Some(dir.path().join("history")));
        for _ in 0..5 {
            history.on_step();
        }
        history.on_episode_end(1.5);
        for _ in 0..3 {
            history.on_step();
        }
        history.on_episode_end(-0.5);
        history.save()?;

        let history_ = RunHistory::load(dir.path().join("history"))?;
        assert_eq!(history_.end_rewards, vec![1.5, -0.5]);
        assert_eq!(history_.steps_record, vec![5, 8]);
        assert_eq!(history_.episodes, 2);
        assert_eq!(history_.total_steps, 8);
        Ok(())
    }
}
