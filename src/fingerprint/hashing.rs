use std::collections::HashSet;

/// The set of landmark hashes that identifies a clip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    hashes: HashSet<u64>,
}

impl Fingerprint {
    pub fn hashes(&self) -> &HashSet<u64> {
        &self.hashes
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.hashes.contains(&hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl FromIterator<u64> for Fingerprint {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            hashes: iter.into_iter().collect(),
        }
    }
}

/// Fold per-frame peak lists into a fingerprint.
///
/// A frame without peaks is skipped entirely: it neither hashes nor becomes
/// the history for the next frame.
pub fn generate_hashes(frame_peaks: &[Vec<u32>]) -> Fingerprint {
    let mut previous: &[u32] = &[];

    frame_peaks
        .iter()
        .enumerate()
        .filter(|(_, peaks)| !peaks.is_empty())
        .filter_map(|(frame, peaks)| {
            let hash = hash_peaks(peaks, previous, frame);
            previous = peaks.as_slice();
            hash
        })
        .collect()
}

/// Pack one frame's landmark into 64 bits.
///
/// Layout, most significant first: peak 0, peak 1, then either
/// `frame index | previous peak 0 ^ peak 0` when the previous frame had two
/// peaks, or `peak 2 | 0` when this frame has a third. Each field is 16 bits.
/// Returns `None` for fewer than two peaks or an all-zero hash.
pub fn hash_peaks(peaks: &[u32], previous: &[u32], frame: usize) -> Option<u64> {
    if peaks.len() < 2 {
        return None;
    }

    let mut hash = field(peaks[0]) << 48 | field(peaks[1]) << 32;

    if previous.len() >= 2 {
        hash |= (frame as u64 & 0xFFFF) << 16;
        hash |= field(previous[0] ^ peaks[0]);
    } else if let Some(&third) = peaks.get(2) {
        hash |= field(third) << 16;
    }

    (hash != 0).then_some(hash)
}

fn field(value: u32) -> u64 {
    (value & 0xFFFF) as u64
}
