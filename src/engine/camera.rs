use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

/// Perspective camera that drifts toward a pointer-derived target and always
/// looks at the origin.
#[derive(Debug, Clone)]
pub struct CameraRig {
    config: CameraConfig,
    position: Vec3,
    /// Pointer relative to the viewport centre, vertical bias applied
    pointer: (f32, f32),
    scroll: f32,
    viewport: (u32, u32),
}

impl CameraRig {
    pub fn new(config: CameraConfig, width: u32, height: u32) -> Self {
        Self {
            position: Vec3::from_array(config.start),
            pointer: (100.0, 100.0),
            scroll: 0.0,
            viewport: (width.max(1), height.max(1)),
            config,
        }
    }

    /// Takes a raw window-space cursor position.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        let (w, h) = self.viewport;
        self.pointer = (
            x - w as f32 / 2.0,
            y - h as f32 / 2.0 - self.config.pointer_bias_y,
        );
    }

    pub fn set_scroll(&mut self, scroll: f32) {
        self.scroll = scroll;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }

    /// One frame of easing toward the pointer target.
    pub fn ease(&mut self) {
        let k = self.config.easing;
        let (px, py) = self.pointer;
        let target = Vec3::new(
            px,
            -2.0 * py + 20.0 - self.config.scroll_factor * self.scroll,
            -2.3 * py + 300.0,
        );
        self.position += (target - self.position) * k;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn pointer(&self) -> (f32, f32) {
        self.pointer
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.config.fov_degrees.to_radians(),
            self.aspect(),
            self.config.near,
            self.config.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_configured_position() {
        let rig = CameraRig::new(CameraConfig::default(), 800, 600);
        assert_eq!(rig.position(), Vec3::new(0.0, 200.0, 1000.0));
        assert!((rig.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn one_ease_step_moves_one_percent() {
        let mut rig = CameraRig::new(CameraConfig::default(), 800, 600);
        // Cursor at (500, 700): pointer (100, 100).
        rig.set_pointer(500.0, 700.0);
        assert_eq!(rig.pointer(), (100.0, 100.0));
        rig.ease();

        let p = rig.position();
        assert!((p.x - 1.0).abs() < 1e-4);
        assert!((p.y - (200.0 + (-180.0 - 200.0) * 0.01)).abs() < 1e-4);
        assert!((p.z - (1000.0 + (70.0 - 1000.0) * 0.01)).abs() < 1e-3);
    }

    #[test]
    fn converges_on_the_target() {
        let mut rig = CameraRig::new(CameraConfig::default(), 800, 600);
        rig.set_pointer(400.0, 600.0);
        rig.set_scroll(100.0);
        for _ in 0..3000 {
            rig.ease();
        }
        let p = rig.position();
        assert!(p.x.abs() < 0.01);
        assert!((p.y - 0.0).abs() < 0.01);
        assert!((p.z - 300.0).abs() < 0.01);
    }

    #[test]
    fn origin_projects_to_screen_centre() {
        let rig = CameraRig::new(CameraConfig::default(), 800, 600);
        let clip = rig.view_proj() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
