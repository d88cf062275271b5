//! Demo scene: one draw item per grid point.

use glam::Vec3;
use prism_core::DrawItem;

/// A fixed set of draw items.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    items: Vec<DrawItem>,
}

impl Scene {
    /// Scene from explicit draw items.
    pub fn new(items: Vec<DrawItem>) -> Self {
        Self { items }
    }

    /// Translations covering `[min, max]` on both axes in `step` increments,
    /// row by row. Both ends are included.
    pub fn grid(min: f32, max: f32, step: f32) -> Self {
        if step <= 0.0 || max < min {
            return Self::default();
        }

        // Integer steps avoid accumulating float error along a row
        let steps = ((max - min) / step).round() as u32;
        let coord = |i: u32| min + i as f32 * step;

        let items = (0..=steps)
            .flat_map(|row| {
                (0..=steps).map(move |col| {
                    DrawItem::from_translation(Vec3::new(coord(col), coord(row), 0.0))
                })
            })
            .collect();

        Self { items }
    }

    /// The viewer's scene: x and y from -1 to 1 in steps of 0.2.
    pub fn demo() -> Self {
        Self::grid(-1.0, 1.0, 0.2)
    }

    /// Items to draw this frame.
    pub fn draw_items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn translation(item: &DrawItem) -> Vec3 {
        item.transform.w_axis.truncate()
    }

    #[test]
    fn demo_grid_has_eleven_by_eleven_items() {
        let scene = Scene::demo();
        assert_eq!(scene.len(), 121);

        let items = scene.draw_items();
        let first = translation(&items[0]);
        let last = translation(&items[120]);
        assert_relative_eq!(first.x, -1.0);
        assert_relative_eq!(first.y, -1.0);
        assert_relative_eq!(last.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(last.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn grid_rows_advance_in_y() {
        let scene = Scene::grid(0.0, 1.0, 0.5);
        let positions: Vec<(f32, f32)> = scene
            .draw_items()
            .iter()
            .map(|item| {
                let t = translation(item);
                (t.x, t.y)
            })
            .collect();
        assert_eq!(
            positions,
            vec![
                (0.0, 0.0),
                (0.5, 0.0),
                (1.0, 0.0),
                (0.0, 0.5),
                (0.5, 0.5),
                (1.0, 0.5),
                (0.0, 1.0),
                (0.5, 1.0),
                (1.0, 1.0),
            ]
        );
        assert!(scene
            .draw_items()
            .iter()
            .all(|item| translation(item).z == 0.0));
    }

    #[test]
    fn degenerate_grids_are_empty() {
        assert!(Scene::grid(0.0, 1.0, 0.0).is_empty());
        assert!(Scene::grid(1.0, 0.0, 0.1).is_empty());
        assert_eq!(Scene::grid(0.5, 0.5, 0.1).len(), 1);
    }
}
