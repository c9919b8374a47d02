use glam::{Mat4, Vec3};

/// Pan/zoom of one map viewport.
///
/// `scale` is a uniform zoom factor (> 0); `shift_x`/`shift_y` pan the world
/// in world pixels.  Nothing here clamps: keeping values sane is the input
/// handler's job.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewState {
    pub scale: f32,
    pub shift_x: f32,
    pub shift_y: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { scale: 1.0, shift_x: 0.0, shift_y: 0.0 }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        debug_assert!(scale > 0.0, "view scale must be positive, got {scale}");
        self.scale = scale;
    }

    pub fn shift(&self) -> [f32; 2] {
        [self.shift_x, self.shift_y]
    }

    pub fn set_shift(&mut self, x: f32, y: f32) {
        self.shift_x = x;
        self.shift_y = y;
    }

    /// Frame transform for a `width × height` pixel viewport.
    ///
    /// ```text
    /// ortho(0..width, 0..height) · scale(s) · translate(shift)
    /// ```
    /// which equals `ortho(0..width/s, 0..height/s) · translate(shift)`: zoom
    /// scales the shifted world, so world `(0, 0)` stays at the viewport's
    /// bottom-left corner at every scale when the shift is zero.
    pub fn transform(&self, width: f32, height: f32) -> Mat4 {
        let projection = Mat4::orthographic_rh(0.0, width, 0.0, height, -1.0, 1.0);
        let zoom = Mat4::from_scale(Vec3::new(self.scale, self.scale, 1.0));
        let pan = Mat4::from_translation(Vec3::new(self.shift_x, self.shift_y, 0.0));
        projection * zoom * pan
    }

    /// World-space extent visible in a `width × height` pixel viewport.
    pub fn visible_extent(&self, width: f32, height: f32) -> [f32; 2] {
        [width / self.scale, height / self.scale]
    }

    /// True when the box `[x1, y1, x2, y2]`, shifted by the pan, lies entirely
    /// outside `[0, w] × [0, h]`.  `w`/`h` are already divided by the scale.
    /// Boxes touching an edge count as visible.
    pub fn is_out_of_bounds(&self, bounds: [f32; 4], w: f32, h: f32) -> bool {
        let [x1, y1, x2, y2] = bounds;
        let (bx1, by1) = (x1 + self.shift_x, y1 + self.shift_y);
        let (bx2, by2) = (x2 + self.shift_x, y2 + self.shift_y);
        bx1 > w || by1 > h || bx2 < 0.0 || by2 < 0.0
    }

    /// Convert a panel position (pixels, y down from the top edge) to world pixels.
    pub fn screen_to_world(&self, screen_x: f32, screen_y: f32, viewport_height: f32) -> [f32; 2] {
        [
            screen_x / self.scale - self.shift_x,
            (viewport_height - screen_y) / self.scale - self.shift_y,
        ]
    }

    /// Inverse of [`screen_to_world`](Self::screen_to_world).
    pub fn world_to_screen(&self, world_x: f32, world_y: f32, viewport_height: f32) -> [f32; 2] {
        [
            (world_x + self.shift_x) * self.scale,
            viewport_height - (world_y + self.shift_y) * self.scale,
        ]
    }

    /// Pan by a mouse drag of `(dx, dy)` panel pixels (y down).
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.shift_x += dx / self.scale;
        self.shift_y -= dy / self.scale;
    }

    /// Multiply the scale by `factor`, keeping the world point under the
    /// panel position `anchor` fixed on screen.
    pub fn zoom_at(&mut self, factor: f32, anchor: [f32; 2], viewport_height: f32) {
        let before = self.screen_to_world(anchor[0], anchor[1], viewport_height);
        self.scale *= factor;
        let after = self.screen_to_world(anchor[0], anchor[1], viewport_height);
        self.shift_x += after[0] - before[0];
        self.shift_y += after[1] - before[1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn clip(m: Mat4, x: f32, y: f32) -> [f32; 2] {
        let p = m * Vec4::new(x, y, 0.0, 1.0);
        [p.x / p.w, p.y / p.w]
    }

    fn close(a: [f32; 2], b: [f32; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-4 && (a[1] - b[1]).abs() < 1e-4
    }

    #[test]
    fn identity_view_maps_corners() {
        let m = ViewState::new().transform(800.0, 600.0);
        assert!(close(clip(m, 0.0, 0.0), [-1.0, -1.0]));
        assert!(close(clip(m, 800.0, 600.0), [1.0, 1.0]));
    }

    #[test]
    fn zoom_scales_world_about_origin() {
        let mut v = ViewState::new();
        v.set_scale(2.0);
        let m = v.transform(800.0, 600.0);
        // Half the world width now fills the viewport.
        assert!(close(clip(m, 400.0, 300.0), [1.0, 1.0]));
        assert!(close(clip(m, 0.0, 0.0), [-1.0, -1.0]));
    }

    #[test]
    fn shift_moves_world_origin() {
        let mut v = ViewState::new();
        v.set_shift(100.0, 0.0);
        let m = v.transform(800.0, 600.0);
        assert!(close(clip(m, -100.0, 0.0), [-1.0, -1.0]));
    }

    #[test]
    fn depth_stays_inside_clip_range() {
        let p = ViewState::new().transform(10.0, 10.0) * Vec4::new(3.0, 3.0, 0.0, 1.0);
        assert!((0.0..=1.0).contains(&p.z));
    }

    #[test]
    fn edge_touching_box_is_visible() {
        let v = ViewState::new();
        assert!(!v.is_out_of_bounds([100.0, 0.0, 132.0, 32.0], 100.0, 100.0));
        assert!(v.is_out_of_bounds([100.5, 0.0, 132.0, 32.0], 100.0, 100.0));
        assert!(!v.is_out_of_bounds([-32.0, -32.0, 0.0, 0.0], 100.0, 100.0));
    }

    #[test]
    fn screen_world_round_trip() {
        let v = ViewState { scale: 1.5, shift_x: -40.0, shift_y: 12.0 };
        let w = v.screen_to_world(321.0, 77.0, 480.0);
        let s = v.world_to_screen(w[0], w[1], 480.0);
        assert!(close(s, [321.0, 77.0]));
    }

    #[test]
    fn screen_top_left_is_world_top() {
        let v = ViewState::new();
        assert_eq!(v.screen_to_world(0.0, 0.0, 600.0), [0.0, 600.0]);
    }

    #[test]
    fn zoom_at_keeps_anchor_fixed() {
        let mut v = ViewState { scale: 1.0, shift_x: 10.0, shift_y: -5.0 };
        let anchor = [200.0, 150.0];
        let before = v.screen_to_world(anchor[0], anchor[1], 600.0);
        v.zoom_at(2.0, anchor, 600.0);
        assert_eq!(v.scale, 2.0);
        let after = v.screen_to_world(anchor[0], anchor[1], 600.0);
        assert!(close(before, after));
    }

    #[test]
    fn drag_right_moves_world_right() {
        let mut v = ViewState { scale: 2.0, shift_x: 0.0, shift_y: 0.0 };
        v.pan_by(20.0, 10.0);
        assert_eq!(v.shift(), [10.0, -5.0]);
    }
}
