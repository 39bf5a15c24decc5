#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Everything in front of the ray origin.
    pub fn forward() -> Self {
        Self {
            min: 0.0,
            max: f32::INFINITY,
        }
    }

    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    pub fn contains(&self, x: f32) -> bool {
        self.min <= x && x <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive() {
        let interval = Interval::new(1.0, 2.0);
        assert!(interval.contains(1.0));
        assert!(interval.contains(2.0));
        assert!(!interval.contains(2.5));
        assert_eq!(interval.size(), 1.0);
    }

    #[test]
    fn test_forward() {
        let interval = Interval::forward();
        assert!(interval.contains(0.0));
        assert!(interval.contains(1e30));
        assert!(!interval.contains(-1e-6));
    }
}
