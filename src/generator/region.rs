//! Input and output regions of a generator

use serde::{Deserialize, Serialize};

/// Rectangle a region covers on its generator's lattice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RegionRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }
}

/// A rectangle-addressed slot holding one scalar intensity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub rect: RegionRect,
    intensity: f64,
}

impl Region {
    pub fn new(rect: RegionRect, intensity: f64) -> Self {
        Self { rect, intensity }
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Store a new intensity, returning whether it changed
    pub fn write_intensity(&mut self, intensity: f64) -> bool {
        if self.intensity == intensity {
            return false;
        }
        self.intensity = intensity;
        true
    }
}

/// Ordered regions; position determines the 1-based wire index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` regions laid out side by side, all at zero intensity
    pub fn with_count(count: usize) -> Self {
        let regions = (0..count)
            .map(|i| Region::new(RegionRect::new(i as i32, 0, 1, 1), 0.0))
            .collect();
        Self { regions }
    }

    pub fn add_region(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub fn delete_region(&mut self, index: usize) -> Option<Region> {
        if index < self.regions.len() {
            Some(self.regions.remove(index))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Region> {
        self.regions.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Region> {
        self.regions.iter_mut()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.regions.iter().map(Region::intensity).collect()
    }

    /// Mean intensity, 0.0 when there are no regions
    pub fn mean_intensity(&self) -> f64 {
        if self.regions.is_empty() {
            return 0.0;
        }
        self.regions.iter().map(Region::intensity).sum::<f64>() / self.regions.len() as f64
    }
}
