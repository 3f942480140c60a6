//! Sampled region-occlusion explainer.
//!
//! The image is cut into a square grid of regions. Each sample switches a
//! random subset of regions off (painted black) and is scored through the
//! supplied [`Scorer`]. A region's weight is the mean score of the
//! explained label over samples where it was on, minus the mean over
//! samples where it was off. The highest positive weights form the mask.
//!
//! Sample 0 is always the unperturbed image; its top label is the one
//! being explained.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xplain_core::capability::{ExplainParams, Explainer, Explanation, Scorer};
use xplain_core::error::CoreError;
use xplain_core::image::{ImageTensor, PixelMask};
use xplain_core::labels::argmax;

/// Default number of regions per side (8 x 8 = 64 regions).
pub const DEFAULT_GRID: u32 = 8;

/// Colour used for switched-off regions.
const HIDE_COLOR: [f32; 3] = [0.0, 0.0, 0.0];

/// Default explanation capability.
#[derive(Debug, Clone)]
pub struct SampledExplainer {
    grid: u32,
    seed: Option<u64>,
}

impl SampledExplainer {
    pub fn new(grid: u32) -> Self {
        Self {
            grid: grid.max(1),
            seed: None,
        }
    }

    /// Use a fixed RNG seed, making the sampled masks reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn regions(&self) -> usize {
        (self.grid * self.grid) as usize
    }

    /// Region index of pixel `(x, y)`.
    fn region_of(&self, image: &ImageTensor, x: u32, y: u32) -> usize {
        let gx = (x as u64 * self.grid as u64 / image.width as u64) as usize;
        let gy = (y as u64 * self.grid as u64 / image.height as u64) as usize;
        gy * self.grid as usize + gx
    }

    /// On/off pattern for every sample; sample 0 has every region on.
    fn sample_masks(&self, num_samples: usize) -> Vec<Vec<bool>> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let regions = self.regions();
        (0..num_samples)
            .map(|i| {
                if i == 0 {
                    vec![true; regions]
                } else {
                    (0..regions).map(|_| rng.random_bool(0.5)).collect()
                }
            })
            .collect()
    }
}

impl Default for SampledExplainer {
    fn default() -> Self {
        Self::new(DEFAULT_GRID)
    }
}

#[async_trait]
impl Explainer for SampledExplainer {
    async fn explain(
        &self,
        image: &ImageTensor,
        scorer: &mut dyn Scorer,
        params: &ExplainParams,
    ) -> Result<Explanation, CoreError> {
        if image.width == 0 || image.height == 0 {
            return Err(CoreError::Validation("Cannot explain an empty image".into()));
        }

        let num_samples = params.num_samples.max(1);
        let batch_size = params.batch_size.max(1);
        let masks = self.sample_masks(num_samples);

        let region_map: Arc<Vec<usize>> = Arc::new(
            (0..image.height)
                .flat_map(|y| (0..image.width).map(move |x| (x, y)))
                .map(|(x, y)| self.region_of(image, x, y))
                .collect(),
        );
        let source = Arc::new(image.clone());

        let mut all_scores = Vec::with_capacity(num_samples);
        for chunk in masks.chunks(batch_size) {
            let (source, region_map, chunk) =
                (Arc::clone(&source), Arc::clone(&region_map), chunk.to_vec());
            let batch = tokio::task::spawn_blocking(move || {
                chunk
                    .iter()
                    .map(|on| perturb(&source, &region_map, on))
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(|e| CoreError::Internal(format!("Perturbation task failed: {e}")))?;
            all_scores.extend(scorer.score(&batch).await?);
        }

        let label = argmax(&all_scores[0])
            .ok_or_else(|| CoreError::Inference("Classifier returned an empty score vector".into()))?;

        let weights = region_weights(&masks, &all_scores, label, self.regions())?;

        let mut ranked: Vec<usize> = (0..weights.len()).filter(|&r| weights[r] > 0.0).collect();
        ranked.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));
        ranked.truncate(params.num_features);

        let mut selected = vec![false; self.regions()];
        for r in ranked {
            selected[r] = true;
        }

        let mut mask = PixelMask::empty(image.width, image.height);
        for y in 0..image.height {
            for x in 0..image.width {
                if selected[region_map[(y * image.width + x) as usize]] {
                    mask.set(x, y, true);
                }
            }
        }

        Ok(Explanation { label, mask })
    }
}

/// Copy of `image` with every pixel of a switched-off region painted over.
fn perturb(image: &ImageTensor, region_map: &[usize], on: &[bool]) -> ImageTensor {
    let mut out = image.clone();
    for y in 0..image.height {
        for x in 0..image.width {
            let region = region_map[(y * image.width + x) as usize];
            if !on[region] {
                out.set_pixel(x, y, HIDE_COLOR);
            }
        }
    }
    out
}

/// Mean score with the region on minus mean score with it off.
fn region_weights(
    masks: &[Vec<bool>],
    scores: &[Vec<f32>],
    label: usize,
    regions: usize,
) -> Result<Vec<f64>, CoreError> {
    let mut on_sum = vec![0.0_f64; regions];
    let mut on_n = vec![0_usize; regions];
    let mut off_sum = vec![0.0_f64; regions];
    let mut off_n = vec![0_usize; regions];

    for (mask, score) in masks.iter().zip(scores) {
        let value = f64::from(*score.get(label).ok_or_else(|| {
            CoreError::Inference(format!("Score vector has no entry for label {label}"))
        })?);
        for (r, on) in mask.iter().enumerate() {
            if *on {
                on_sum[r] += value;
                on_n[r] += 1;
            } else {
                off_sum[r] += value;
                off_n[r] += 1;
            }
        }
    }

    Ok((0..regions)
        .map(|r| {
            if on_n[r] == 0 || off_n[r] == 0 {
                0.0
            } else {
                on_sum[r] / on_n[r] as f64 - off_sum[r] / off_n[r] as f64
            }
        })
        .collect())
}
