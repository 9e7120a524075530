//! Grid, axis guides and text labels for the active view.
//!
//! [`SceneLabelBuilder`] is pure: it turns a view into a [`SceneGuides`]
//! description. [`SceneLayers`] owns what a [`GuideBackend`] created from that
//! description, one list per tagged layer, and releases it before every
//! rebuild. Rebuilds happen on view changes only.

use bevy::color::Color;
use bevy::math::Vec3;

use crate::config::ProjectionParams;
use crate::projection::axis_to_world;
use crate::views::{AxisKind, AxisSpec, ViewConfig, ViewKey};

/// Normalized values that get a tick label on continuous axes.
pub const TICK_LEVELS: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

pub const GRID_SIZE: f32 = 150.0;
pub const GRID_DIVISIONS: u32 = 30;

fn grid_center_color() -> Color {
    Color::srgb_u8(0x44, 0x44, 0x44)
}

fn grid_color() -> Color {
    Color::srgb_u8(0x22, 0x22, 0x22)
}

fn axis_color() -> Color {
    Color::srgb_u8(0x88, 0x88, 0x88)
}

/// Axis line extents.
const X_AXIS_HALF: f32 = 75.0;
const Y_AXIS_TOP: f32 = 40.0;
const Z_AXIS_HALF: f32 = 60.0;

/// Depth of the back plane holding x and y labels.
const BACK_Z: f32 = -65.0;
const SIDE_X: f32 = -85.0;
const Z_TICK_X: f32 = -95.0;
const X_TICK_Y: f32 = -8.0;
const FLOOR_LABEL_Y: f32 = -3.0;
const Y_TICK_X: f32 = -20.0;
const Y_TICK_HALF: f32 = 5.0;
const Y_TITLE_HEIGHT: f32 = 20.0;

/// Independently owned groups of scene objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneLayer {
    /// Ground grid, axis lines and tick marks
    Grid,
    /// Text labels
    Labels,
    /// Agent render objects
    Entities,
}

/// A colored line segment in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Color,
}

impl LineSegment {
    fn new(start: Vec3, end: Vec3, color: Color) -> Self {
        Self { start, end, color }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    AxisTitle,
    Tick,
    Category,
}

/// Text anchored at a world position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub anchor: Vec3,
    pub kind: LabelKind,
}

impl TextLabel {
    fn new(text: impl Into<String>, anchor: Vec3, kind: LabelKind) -> Self {
        Self {
            text: text.into(),
            anchor,
            kind,
        }
    }
}

/// Everything drawn around the data for one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGuides {
    pub grid: Vec<LineSegment>,
    pub axes: Vec<LineSegment>,
    pub tick_marks: Vec<LineSegment>,
    pub labels: Vec<TextLabel>,
}

impl SceneGuides {
    /// All line segments of the grid layer.
    pub fn lines(&self) -> impl Iterator<Item = &LineSegment> {
        self.grid.iter().chain(&self.axes).chain(&self.tick_marks)
    }

    pub fn labels_of(&self, kind: LabelKind) -> impl Iterator<Item = &TextLabel> {
        self.labels.iter().filter(move |l| l.kind == kind)
    }
}

/// Builds the guides for a view.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneLabelBuilder {
    params: ProjectionParams,
}

impl SceneLabelBuilder {
    pub fn new(params: ProjectionParams) -> Self {
        Self { params }
    }

    pub fn build(&self, view: &ViewConfig) -> SceneGuides {
        let mut guides = SceneGuides {
            grid: ground_grid(),
            axes: vec![
                LineSegment::new(
                    Vec3::new(-X_AXIS_HALF, 0.0, 0.0),
                    Vec3::new(X_AXIS_HALF, 0.0, 0.0),
                    axis_color(),
                ),
                LineSegment::new(Vec3::ZERO, Vec3::new(0.0, Y_AXIS_TOP, 0.0), axis_color()),
                LineSegment::new(
                    Vec3::new(0.0, 0.0, -Z_AXIS_HALF),
                    Vec3::new(0.0, 0.0, Z_AXIS_HALF),
                    axis_color(),
                ),
            ],
            ..Default::default()
        };

        guides.labels.push(TextLabel::new(
            format!("{} →", view.x.label),
            Vec3::new(0.0, FLOOR_LABEL_Y, BACK_Z),
            LabelKind::AxisTitle,
        ));
        guides.labels.push(TextLabel::new(
            format!("↑ {}", view.y.label),
            Vec3::new(SIDE_X, Y_TITLE_HEIGHT, 0.0),
            LabelKind::AxisTitle,
        ));
        guides.labels.push(TextLabel::new(
            format!("← {} →", view.z.label),
            Vec3::new(SIDE_X, FLOOR_LABEL_Y, 0.0),
            LabelKind::AxisTitle,
        ));

        self.axis_labels(&view.x, &mut guides, |w| Vec3::new(w.x, X_TICK_Y, BACK_Z));
        self.axis_labels(&view.y, &mut guides, |w| Vec3::new(Y_TICK_X, w.y, BACK_Z));
        self.axis_labels(&view.z, &mut guides, |w| Vec3::new(Z_TICK_X, FLOOR_LABEL_Y, w.z));

        if view.y.kind == AxisKind::Continuous {
            for level in TICK_LEVELS {
                let y = self.world(level).y;
                guides.tick_marks.push(LineSegment::new(
                    Vec3::new(-Y_TICK_HALF, y, BACK_Z),
                    Vec3::new(Y_TICK_HALF, y, BACK_Z),
                    axis_color(),
                ));
            }
        }

        guides
    }

    /// World position of a normalized value on all three axes.
    fn world(&self, value: f32) -> Vec3 {
        axis_to_world([value; 3], &self.params)
    }

    fn axis_labels(&self, axis: &AxisSpec, guides: &mut SceneGuides, place: impl Fn(Vec3) -> Vec3) {
        match axis.kind {
            AxisKind::Continuous => {
                let format = axis.tick_format();
                for level in TICK_LEVELS {
                    guides.labels.push(TextLabel::new(
                        format.format(level),
                        place(self.world(level)),
                        LabelKind::Tick,
                    ));
                }
            }
            AxisKind::Categorical => {
                for (category, value) in axis.category_values() {
                    guides.labels.push(TextLabel::new(
                        category,
                        place(self.world(value)),
                        LabelKind::Category,
                    ));
                }
            }
        }
    }
}

fn ground_grid() -> Vec<LineSegment> {
    let half = GRID_SIZE / 2.0;
    let step = GRID_SIZE / GRID_DIVISIONS as f32;
    let mut lines = Vec::with_capacity(2 * (GRID_DIVISIONS as usize + 1));
    for i in 0..=GRID_DIVISIONS {
        let offset = -half + i as f32 * step;
        let color = if i == GRID_DIVISIONS / 2 {
            grid_center_color()
        } else {
            grid_color()
        };
        lines.push(LineSegment::new(
            Vec3::new(-half, 0.0, offset),
            Vec3::new(half, 0.0, offset),
            color,
        ));
        lines.push(LineSegment::new(
            Vec3::new(offset, 0.0, -half),
            Vec3::new(offset, 0.0, half),
            color,
        ));
    }
    lines
}

/// Rasterizes text labels into backend textures.
pub trait LabelTextureFactory {
    type Texture;

    fn rasterize(&mut self, label: &TextLabel) -> Self::Texture;
    fn release_texture(&mut self, texture: Self::Texture);
}

/// Backend for the grid layer on top of label rasterization.
pub trait GuideBackend: LabelTextureFactory {
    type Lines;

    fn create_lines(&mut self, layer: SceneLayer, lines: &[LineSegment]) -> Self::Lines;
    fn release_lines(&mut self, lines: Self::Lines);
}

/// Owns the grid and label layers created for the current view.
pub struct SceneLayers<B: GuideBackend> {
    backend: B,
    grid: Vec<B::Lines>,
    labels: Vec<B::Texture>,
    view: Option<ViewKey>,
}

impl<B: GuideBackend> SceneLayers<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            grid: Vec::new(),
            labels: Vec::new(),
            view: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// View the layers were last built for.
    pub fn view(&self) -> Option<ViewKey> {
        self.view
    }

    /// Replaces both layers with objects for `guides`.
    pub fn rebuild(&mut self, view: ViewKey, guides: &SceneGuides) {
        self.release();

        let lines: Vec<LineSegment> = guides.lines().copied().collect();
        self.grid.push(self.backend.create_lines(SceneLayer::Grid, &lines));
        for label in &guides.labels {
            let texture = self.backend.rasterize(label);
            self.labels.push(texture);
        }
        self.view = Some(view);

        tracing::debug!(%view, lines = lines.len(), labels = self.labels.len(), "Rebuilt scene guides");
    }

    /// Releases every object in both layers. Returns how many were released.
    pub fn release(&mut self) -> usize {
        let count = self.grid.len() + self.labels.len();
        for lines in self.grid.drain(..) {
            self.backend.release_lines(lines);
        }
        for texture in self.labels.drain(..) {
            self.backend.release_texture(texture);
        }
        self.view = None;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::ViewRegistry;

    #[derive(Default)]
    struct CountingGuides {
        live_lines: usize,
        live_textures: usize,
        rasterized: Vec<String>,
    }

    impl LabelTextureFactory for CountingGuides {
        type Texture = ();

        fn rasterize(&mut self, label: &TextLabel) {
            self.live_textures += 1;
            self.rasterized.push(label.text.clone());
        }

        fn release_texture(&mut self, _texture: ()) {
            self.live_textures -= 1;
        }
    }

    impl GuideBackend for CountingGuides {
        type Lines = usize;

        fn create_lines(&mut self, _layer: SceneLayer, lines: &[LineSegment]) -> usize {
            self.live_lines += 1;
            lines.len()
        }

        fn release_lines(&mut self, _lines: usize) {
            self.live_lines -= 1;
        }
    }

    fn build(key: ViewKey) -> SceneGuides {
        SceneLabelBuilder::default().build(ViewRegistry::default().get(key))
    }

    #[test]
    fn test_grid_and_axes() {
        let guides = build(ViewKey::RiskBehavior);
        assert_eq!(guides.grid.len(), 62);
        assert_eq!(guides.axes.len(), 3);
        assert_eq!(guides.axes[1].end, Vec3::new(0.0, 40.0, 0.0));
        assert_eq!(guides.tick_marks.len(), 5);
    }

    #[test]
    fn test_continuous_view_has_five_ticks_per_axis() {
        let guides = build(ViewKey::RiskBehavior);
        assert_eq!(guides.labels_of(LabelKind::AxisTitle).count(), 3);
        assert_eq!(guides.labels_of(LabelKind::Tick).count(), 15);
        assert_eq!(guides.labels_of(LabelKind::Category).count(), 0);
    }

    #[test]
    fn test_categorical_axis_labels_sit_at_projected_values() {
        let guides = build(ViewKey::SelfKnowledge);
        let categories: Vec<_> = guides.labels_of(LabelKind::Category).collect();
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[2].text, "High");
        assert!((categories[2].anchor.z - 30.0).abs() < 1e-4);
        assert_eq!(categories[2].anchor.x, -95.0);
        assert_eq!(guides.labels_of(LabelKind::Tick).count(), 10);
    }

    #[test]
    fn test_y_ticks_follow_projection_heights() {
        let guides = build(ViewKey::SelfKnowledge);
        let heights: Vec<f32> = guides
            .labels_of(LabelKind::Tick)
            .filter(|l| l.anchor.x == -20.0)
            .map(|l| l.anchor.y)
            .collect();
        assert_eq!(heights, vec![3.0, 11.75, 20.5, 29.25, 38.0]);
    }

    #[test]
    fn test_tick_text_depends_on_axis() {
        let guides = build(ViewKey::TaskFarming);
        let texts: Vec<&str> = guides
            .labels_of(LabelKind::Tick)
            .map(|l| l.text.as_str())
            .collect();
        assert!(texts.contains(&"20x"));
        assert!(texts.contains(&"25y"));
        assert!(texts.contains(&"75%"));

        let outcomes = build(ViewKey::AspirationOutcomes);
        assert!(outcomes.labels.iter().any(|l| l.text == "$3000"));
        assert!(outcomes.labels.iter().any(|l| l.text == "↑ TOTAL REWARDS"));
    }

    #[test]
    fn test_layers_release_before_rebuild() {
        let mut layers = SceneLayers::new(CountingGuides::default());
        layers.rebuild(ViewKey::SelfKnowledge, &build(ViewKey::SelfKnowledge));
        let first = layers.labels.len();
        assert_eq!(layers.backend().live_textures, first);

        layers.rebuild(ViewKey::RiskBehavior, &build(ViewKey::RiskBehavior));
        assert_eq!(layers.backend().live_lines, 1);
        assert_eq!(layers.backend().live_textures, 18);
        assert_eq!(layers.view(), Some(ViewKey::RiskBehavior));

        assert_eq!(layers.release(), 19);
        assert_eq!(layers.release(), 0);
        assert_eq!(layers.backend().live_textures, 0);
    }
}
