use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    orig: Vec3,
    dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            orig: origin,
            dir: direction,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.orig
    }

    pub fn direction(&self) -> Vec3 {
        self.dir
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.orig + self.dir * t
    }

    /// Moves the ray into another space. The direction is not renormalised, so a
    /// parameter `t` names the same point in both spaces.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            orig: matrix.transform_point3(self.orig),
            dir: matrix.transform_vector3(self.dir),
        }
    }
}
