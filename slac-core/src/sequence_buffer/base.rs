//! Circular storage of transitions grouped by episode.
use super::{SacBatch, SequenceBatch, SequenceBufferConfig};
use crate::{error::SlacError, window::ObservationWindow};
use anyhow::Result;
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;

/// Bookkeeping of an episode.
///
/// `start` is the global index of the first transition of the episode.
/// The initial observation is kept here, outside of the circular storage.
struct Episode {
    start: usize,
    len: usize,
    init_image: Vec<u8>,
    init_tactile: Vec<f32>,
    closed: bool,
}

/// A replay buffer storing transitions and sampling windows of them.
///
/// Transitions are addressed by a monotonically increasing global index `g`,
/// stored at slot `g % capacity`. A transition with global index `g` is live
/// iff `g >= total - capacity`. A window is drawn only from an episode whose
/// first transition is live, so a window never contains overwritten data and
/// never crosses an episode boundary. An episode longer than the capacity
/// therefore has no window once its first transition is overwritten; the
/// trainer rejects such environments.
pub struct SequenceBuffer {
    capacity: usize,
    num_sequences: usize,
    image_shape: [usize; 3],
    image_size: usize,
    tactile_dim: usize,
    action_dim: usize,

    /// The number of transitions appended so far.
    total: usize,

    // Per-transition storage. Observations are those after the transition.
    action: Vec<f32>,
    reward: Vec<f32>,
    done: Vec<bool>,
    mask: Vec<bool>,
    image: Vec<u8>,
    tactile: Vec<f32>,

    episodes: VecDeque<Episode>,
    rng: StdRng,
}

impl SequenceBuffer {
    /// Builds a buffer.
    pub fn build(config: &SequenceBufferConfig) -> Self {
        Self {
            capacity: config.capacity,
            num_sequences: config.num_sequences,
            image_shape: config.image_shape,
            image_size: config.image_size(),
            tactile_dim: config.tactile_dim,
            action_dim: config.action_dim,
            total: 0,
            action: Vec::new(),
            reward: Vec::new(),
            done: Vec::new(),
            mask: Vec::new(),
            image: Vec::new(),
            tactile: Vec::new(),
            episodes: VecDeque::new(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// The number of live transitions.
    pub fn len(&self) -> usize {
        self.total.min(self.capacity)
    }

    /// Returns `true` if no transition has been appended.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The maximum number of live transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of transitions in a window.
    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }

    /// Shape of image observations.
    pub fn image_shape(&self) -> [usize; 3] {
        self.image_shape
    }

    /// Length of tactile observations.
    pub fn tactile_dim(&self) -> usize {
        self.tactile_dim
    }

    /// Dimension of actions.
    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Creates an empty [`ObservationWindow`] matching the shapes of the buffer.
    pub fn observation_window(&self) -> ObservationWindow {
        ObservationWindow::new(
            self.num_sequences,
            self.image_shape,
            self.tactile_dim,
            self.action_dim,
        )
    }

    /// The number of windows that can be sampled.
    pub fn num_windows(&self) -> usize {
        self.eligible().map(|(_, n)| n).sum()
    }

    /// Returns `true` if at least one window can be sampled.
    pub fn is_ready(&self) -> bool {
        self.num_windows() > 0
    }

    /// The global index of the oldest live transition.
    fn oldest(&self) -> usize {
        self.total.saturating_sub(self.capacity)
    }

    /// Indices of episodes windows can be drawn from, with their number of windows.
    fn eligible(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let oldest = self.oldest();
        let s = self.num_sequences;
        self.episodes
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.start >= oldest && e.len >= s)
            .map(move |(i, e)| (i, e.len - s + 1))
    }

    fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(SlacError::ShapeMismatch {
                what,
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Starts a new episode with its initial observation.
    ///
    /// An episode left open is closed.
    pub fn reset_episode(&mut self, image: &[u8], tactile: &[f32]) -> Result<()> {
        Self::check_len("image", self.image_size, image.len())?;
        Self::check_len("tactile", self.tactile_dim, tactile.len())?;

        if let Some(last) = self.episodes.back_mut() {
            last.closed = true;
            if last.len == 0 {
                self.episodes.pop_back();
            }
        }

        debug!("Open episode at transition {}", self.total);
        self.episodes.push_back(Episode {
            start: self.total,
            len: 0,
            init_image: image.to_vec(),
            init_tactile: tactile.to_vec(),
            closed: false,
        });
        Ok(())
    }

    /// Appends a transition to the open episode.
    ///
    /// `image` and `tactile` are the observation after taking `action`.
    /// The oldest transition is overwritten when the buffer is full.
    /// The episode is closed if `done` is `true`.
    pub fn append(
        &mut self,
        action: &[f32],
        reward: f32,
        mask: bool,
        image: &[u8],
        tactile: &[f32],
        done: bool,
    ) -> Result<()> {
        match self.episodes.back() {
            Some(e) if !e.closed => {}
            _ => return Err(SlacError::NoOpenEpisode.into()),
        }
        Self::check_len("action", self.action_dim, action.len())?;
        Self::check_len("image", self.image_size, image.len())?;
        Self::check_len("tactile", self.tactile_dim, tactile.len())?;

        if self.total < self.capacity {
            self.action.extend_from_slice(action);
            self.reward.push(reward);
            self.done.push(done);
            self.mask.push(mask);
            self.image.extend_from_slice(image);
            self.tactile.extend_from_slice(tactile);
        } else {
            let i = self.total % self.capacity;
            let (a, p, t) = (self.action_dim, self.image_size, self.tactile_dim);
            self.action[i * a..(i + 1) * a].copy_from_slice(action);
            self.reward[i] = reward;
            self.done[i] = done;
            self.mask[i] = mask;
            self.image[i * p..(i + 1) * p].copy_from_slice(image);
            self.tactile[i * t..(i + 1) * t].copy_from_slice(tactile);
        }
        self.total += 1;

        if let Some(e) = self.episodes.back_mut() {
            e.len += 1;
            e.closed = done;
        }

        // Closed episodes whose first transition has been overwritten
        // can never be sampled again.
        let oldest = self.oldest();
        while let Some(e) = self.episodes.front() {
            if e.closed && e.start < oldest {
                debug!("Drop episode starting at transition {}", e.start);
                self.episodes.pop_front();
            } else {
                break;
            }
        }

        Ok(())
    }

    /// Draws `batch_size` windows uniformly over all valid windows.
    fn sample_windows(&mut self, batch_size: usize) -> Result<SequenceBatch> {
        let eligible = self.eligible().collect::<Vec<_>>();
        let n_windows: usize = eligible.iter().map(|(_, n)| n).sum();
        if n_windows == 0 {
            return Err(SlacError::WarmUp {
                required: self.num_sequences,
                len: self.len(),
            }
            .into());
        }

        // Cumulative number of windows to locate the episode of a draw
        let cum = eligible
            .iter()
            .scan(0, |acc, (_, n)| {
                *acc += n;
                Some(*acc)
            })
            .collect::<Vec<_>>();

        let (s, a, p, t) = (
            self.num_sequences,
            self.action_dim,
            self.image_size,
            self.tactile_dim,
        );
        let mut batch = SequenceBatch {
            batch_size,
            num_sequences: s,
            image_shape: self.image_shape,
            tactile_dim: t,
            action_dim: a,
            image: Vec::with_capacity(batch_size * (s + 1) * p),
            tactile: Vec::with_capacity(batch_size * (s + 1) * t),
            action: Vec::with_capacity(batch_size * s * a),
            reward: Vec::with_capacity(batch_size * s),
            done: Vec::with_capacity(batch_size * s),
            mask: Vec::with_capacity(batch_size * s),
        };

        for _ in 0..batch_size {
            let u = self.rng.gen_range(0..n_windows);
            let k = cum.partition_point(|&c| c <= u);
            let offset = if k == 0 { u } else { u - cum[k - 1] };
            let episode = &self.episodes[eligible[k].0];
            let first = episode.start + offset;

            // The observation preceding the first transition of the window
            if offset == 0 {
                batch.image.extend_from_slice(&episode.init_image);
                batch.tactile.extend_from_slice(&episode.init_tactile);
            } else {
                let i = (first - 1) % self.capacity;
                batch.image.extend_from_slice(&self.image[i * p..(i + 1) * p]);
                batch
                    .tactile
                    .extend_from_slice(&self.tactile[i * t..(i + 1) * t]);
            }

            for g in first..first + s {
                let i = g % self.capacity;
                batch.image.extend_from_slice(&self.image[i * p..(i + 1) * p]);
                batch
                    .tactile
                    .extend_from_slice(&self.tactile[i * t..(i + 1) * t]);
                batch
                    .action
                    .extend_from_slice(&self.action[i * a..(i + 1) * a]);
                batch.reward.push(self.reward[i]);
                batch.done.push(self.done[i] as i32 as f32);
                batch.mask.push(self.mask[i] as i32 as f32);
            }
        }

        Ok(batch)
    }

    /// Samples a batch for training the latent variable model.
    pub fn sample_latent(&mut self, batch_size: usize) -> Result<SequenceBatch> {
        self.sample_windows(batch_size)
    }

    /// Samples a batch for training the actor and the critic.
    pub fn sample_sac(&mut self, batch_size: usize) -> Result<SacBatch> {
        Ok(self.sample_windows(batch_size)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: usize = 8;

    fn config(capacity: usize) -> SequenceBufferConfig {
        SequenceBufferConfig::default()
            .capacity(capacity)
            .num_sequences(S)
            .image_shape([1, 2, 2])
            .tactile_dim(2)
            .action_dim(3)
            .seed(0)
    }

    /// Observations and rewards carry the episode id; the first tactile
    /// value carries the step within the episode.
    fn run_episode(buffer: &mut SequenceBuffer, id: u8, len: usize, close: bool) -> Result<()> {
        buffer.reset_episode(&[id; 4], &[0.0, id as f32])?;
        for k in 1..=len {
            let done = close && k == len;
            buffer.append(
                &[(k - 1) as f32; 3],
                id as f32,
                done,
                &[id; 4],
                &[k as f32, id as f32],
                done,
            )?;
        }
        Ok(())
    }

    #[test]
    fn test_len_is_bounded_by_capacity() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(10));
        buffer.reset_episode(&[0; 4], &[0.0; 2])?;
        for n in 1..=25 {
            buffer.append(&[0.0; 3], 0.0, false, &[0; 4], &[0.0; 2], false)?;
            assert_eq!(buffer.len(), n.min(10));
        }
        Ok(())
    }

    #[test]
    fn test_samples_only_from_resident_episode() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(100));
        run_episode(&mut buffer, 1, 60, true)?;
        run_episode(&mut buffer, 2, 60, true)?;
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.num_windows(), 60 - S + 1);

        for _ in 0..200 {
            let batch = buffer.sample_latent(1)?;
            assert!(batch.reward.iter().all(|&r| r == 2.0));
            assert!(batch.image.iter().all(|&p| p == 2));
        }
        Ok(())
    }

    #[test]
    fn test_windows_never_mix_episodes() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(200));
        for (id, len) in [(1, 9), (2, 30), (3, 8), (4, 3), (5, 17)] {
            run_episode(&mut buffer, id, len, true)?;
        }
        // An episode shorter than a window has no window
        assert_eq!(buffer.num_windows(), 2 + 23 + 1 + 10);

        let batch = buffer.sample_latent(256)?;
        for b in 0..256 {
            let ids = &batch.tactile[b * (S + 1) * 2..(b + 1) * (S + 1) * 2];
            let id = ids[1];
            assert!(ids.chunks(2).all(|c| c[1] == id));
            assert!(batch.reward[b * S..(b + 1) * S].iter().all(|&r| r == id));
        }
        Ok(())
    }

    #[test]
    fn test_window_alignment() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(200));
        run_episode(&mut buffer, 1, 40, false)?;

        let batch = buffer.sample_latent(64)?;
        for b in 0..64 {
            let tactile = &batch.tactile[b * (S + 1) * 2..(b + 1) * (S + 1) * 2];
            let action = &batch.action[b * S * 3..(b + 1) * S * 3];
            let k0 = tactile[0];
            for j in 0..=S {
                assert_eq!(tactile[2 * j], k0 + j as f32);
            }
            // The j-th action is taken at the j-th observation of the window
            for j in 0..S {
                assert_eq!(action[3 * j], k0 + j as f32);
            }
        }
        Ok(())
    }

    #[test]
    fn test_sac_batch_takes_last_transition() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(100));
        run_episode(&mut buffer, 3, S, true)?;

        let batch = buffer.sample_sac(4)?;
        assert_eq!(batch.reward, vec![3.0; 4]);
        assert_eq!(batch.done, vec![1.0; 4]);
        assert_eq!(batch.mask, vec![1.0; 4]);
        assert_eq!(batch.action.len(), 4 * S * 3);
        assert_eq!(batch.image.len(), 4 * (S + 1) * 4);
        Ok(())
    }

    #[test]
    fn test_sampling_before_warm_up() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(100));
        run_episode(&mut buffer, 1, S - 1, false)?;
        assert!(!buffer.is_ready());

        let err = buffer.sample_latent(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SlacError>(),
            Some(SlacError::WarmUp { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_append_requires_open_episode() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(100));
        let err = buffer
            .append(&[0.0; 3], 0.0, false, &[0; 4], &[0.0; 2], false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SlacError>(),
            Some(SlacError::NoOpenEpisode)
        ));

        run_episode(&mut buffer, 1, 3, true)?;
        let err = buffer
            .append(&[0.0; 3], 0.0, false, &[0; 4], &[0.0; 2], false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SlacError>(),
            Some(SlacError::NoOpenEpisode)
        ));
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(100));
        buffer.reset_episode(&[0; 4], &[0.0; 2])?;
        let err = buffer
            .append(&[0.0; 2], 0.0, false, &[0; 4], &[0.0; 2], false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SlacError>(),
            Some(SlacError::ShapeMismatch {
                what: "action",
                expected: 3,
                actual: 2
            })
        ));
        Ok(())
    }

    #[test]
    fn test_overwritten_episodes_are_dropped() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(50));
        for id in 0..10 {
            run_episode(&mut buffer, id, 20, true)?;
        }
        // Only episodes starting at or after transition 150 remain
        assert!(buffer.episodes.len() <= 3);
        assert_eq!(buffer.num_windows(), 2 * (20 - S + 1));
        Ok(())
    }

    #[test]
    fn test_partially_overwritten_episode_has_no_window() -> Result<()> {
        let mut buffer = SequenceBuffer::build(&config(50));
        run_episode(&mut buffer, 1, 50, false)?;
        assert_eq!(buffer.num_windows(), 50 - S + 1);

        buffer.append(&[0.0; 3], 1.0, false, &[1; 4], &[51.0, 1.0], false)?;
        assert_eq!(buffer.len(), 50);
        assert!(!buffer.is_ready());
        Ok(())
    }
}
