use crate::errors::{
    MsSeekError,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::cmp::Ordering;

/// Largest intensity after normalization, following the MSP export convention.
pub const NORMALIZED_MAX_INTENSITY: f64 = 999.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub mass: f64,
    pub intensity: f64,
}

/// A centroided mass spectrum.
///
/// Peaks are kept sorted by ascending mass and masses are unique, so scoring
/// can align two spectra with a single linear scan.
///
/// The only way to get an empty spectrum is [`Spectrum::default`] or asking
/// [`Spectrum::top_n_peaks`] for zero peaks; [`Spectrum::from_peaks`] refuses
/// empty input.
///
/// # Example
///
/// ```
/// use msseek::Spectrum;
///
/// let spec = Spectrum::from_peaks(vec![(51.0, 27.0), (50.0, 10.0)]).unwrap();
/// assert_eq!(spec.masses().collect::<Vec<_>>(), vec![50.0, 51.0]);
///
/// let norm = spec.normalize(999.0).unwrap();
/// assert_eq!(norm.max_intensity(), 999.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "SerSpectrum", into = "SerSpectrum")]
pub struct Spectrum {
    peaks: Vec<Peak>,
}

/// On-disk/wire shape of a spectrum: two parallel lists, not yet validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SerSpectrum {
    pub(crate) mass_list: Vec<f64>,
    pub(crate) intensity_list: Vec<f64>,
}

impl TryFrom<SerSpectrum> for Spectrum {
    type Error = MsSeekError;

    fn try_from(x: SerSpectrum) -> Result<Self> {
        if x.mass_list.is_empty() && x.intensity_list.is_empty() {
            return Ok(Spectrum::default());
        }
        Spectrum::from_mass_and_intensity(&x.mass_list, &x.intensity_list)
    }
}

impl From<Spectrum> for SerSpectrum {
    fn from(x: Spectrum) -> Self {
        SerSpectrum {
            mass_list: x.masses().collect(),
            intensity_list: x.intensities().collect(),
        }
    }
}

impl Spectrum {
    /// Builds a spectrum from (mass, intensity) pairs in any order.
    ///
    /// Peaks that share the exact same mass are merged by summing their
    /// intensities.
    pub fn from_peaks(pairs: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut peaks: Vec<Peak> = Vec::new();
        for (i, (mass, intensity)) in pairs.into_iter().enumerate() {
            if !mass.is_finite() || mass < 0.0 {
                return Err(MsSeekError::InvalidSpectrum {
                    context: format!("peak {} has invalid mass {}", i, mass),
                });
            }
            if !intensity.is_finite() || intensity < 0.0 {
                return Err(MsSeekError::InvalidSpectrum {
                    context: format!("peak {} has invalid intensity {}", i, intensity),
                });
            }
            peaks.push(Peak { mass, intensity });
        }

        if peaks.is_empty() {
            return Err(MsSeekError::InvalidSpectrum {
                context: "no peaks provided".into(),
            });
        }

        peaks.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        peaks.dedup_by(|curr, prev| {
            if curr.mass == prev.mass {
                prev.intensity += curr.intensity;
                true
            } else {
                false
            }
        });

        Ok(Self { peaks })
    }

    pub fn from_mass_and_intensity(masses: &[f64], intensities: &[f64]) -> Result<Self> {
        if masses.len() != intensities.len() {
            return Err(MsSeekError::InvalidSpectrum {
                context: format!(
                    "got {} masses but {} intensities",
                    masses.len(),
                    intensities.len()
                ),
            });
        }
        Self::from_peaks(masses.iter().copied().zip(intensities.iter().copied()))
    }

    /// Returns a copy scaled so the most intense peak equals `max_intensity`.
    pub fn normalize(&self, max_intensity: f64) -> Result<Self> {
        if self.peaks.is_empty() {
            return Err(MsSeekError::EmptySpectrum {
                context: "cannot normalize a spectrum without peaks".into(),
            });
        }
        let current_max = self.max_intensity();
        if current_max <= 0.0 {
            return Err(MsSeekError::EmptySpectrum {
                context: "cannot normalize a spectrum where all intensities are zero".into(),
            });
        }

        let factor = max_intensity / current_max;
        let peaks = self
            .peaks
            .iter()
            .map(|p| Peak {
                mass: p.mass,
                intensity: p.intensity * factor,
            })
            .collect();
        Ok(Self { peaks })
    }

    /// Keeps the `n` most intense peaks, ties going to the lower mass.
    ///
    /// The output is still sorted by mass.
    pub fn top_n_peaks(&self, n: usize) -> Self {
        if n >= self.peaks.len() {
            return self.clone();
        }
        let mut by_intensity = self.peaks.clone();
        by_intensity.sort_by(|a, b| match b.intensity.total_cmp(&a.intensity) {
            Ordering::Equal => a.mass.total_cmp(&b.mass),
            other => other,
        });
        by_intensity.truncate(n);
        by_intensity.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        Self {
            peaks: by_intensity,
        }
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peak> {
        self.peaks.iter()
    }

    pub fn masses(&self) -> impl Iterator<Item = f64> + '_ {
        self.peaks.iter().map(|p| p.mass)
    }

    pub fn intensities(&self) -> impl Iterator<Item = f64> + '_ {
        self.peaks.iter().map(|p| p.intensity)
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Most intense peak, lowest mass on ties.
    pub fn base_peak(&self) -> Option<Peak> {
        self.peaks.iter().copied().reduce(|best, p| {
            if p.intensity > best.intensity {
                p
            } else {
                best
            }
        })
    }

    pub fn max_intensity(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity).fold(0.0, f64::max)
    }

    /// True when there is at least one peak with a non-zero intensity.
    pub fn has_signal(&self) -> bool {
        self.peaks.iter().any(|p| p.intensity > 0.0)
    }

    pub fn sample() -> Self {
        Self {
            peaks: vec![
                Peak {
                    mass: 39.0,
                    intensity: 120.0,
                },
                Peak {
                    mass: 51.0,
                    intensity: 216.0,
                },
                Peak {
                    mass: 65.0,
                    intensity: 110.0,
                },
                Peak {
                    mass: 77.0,
                    intensity: 164.0,
                },
                Peak {
                    mass: 168.0,
                    intensity: 683.0,
                },
                Peak {
                    mass: 169.0,
                    intensity: 999.0,
                },
            ],
        }
    }
}
