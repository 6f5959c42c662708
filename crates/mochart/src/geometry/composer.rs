//! Turning a computation into line-list vertex batches.
//!
//! The composer maps every successful instance output into its pane using
//! the aggregated [`PaneRanges`](crate::plan::scheduler::PaneRanges) and
//! emits one [`VertexBatch`] per output, guide set, price line and trade
//! marker set. Flattening sorts batches by z-layer; batches on the same
//! layer keep their emission order.

use bytemuck::{Pod, Zeroable};

use super::color::{parse_color, Rgba};
use super::layout::{to_x, PaneLayout};
use super::markers::{nearest_bar, MarkerShape, Segment, TradeMarker};
use crate::plan::definition::{OutputStyle, Pane, PlotStyle, ZLayer};
use crate::plan::registry::Registry;
use crate::plan::scheduler::{Computation, ValueRange};
use crate::series::{Bar, Series};

/// Color of the close-price polyline.
pub const PRICE_COLOR: &str = "#B0BEC5";

/// Color of horizontal guide lines.
pub const GUIDE_COLOR: &str = "rgba(158, 158, 158, 0.5)";

/// Half-extent of indicator marker glyphs.
pub const INDICATOR_MARKER_SIZE: f32 = 0.01;

/// One vertex: device position and normalized RGBA.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// `x, y` in device coordinates.
    pub position: [f32; 2],
    /// `r, g, b, a` in 0..=1.
    pub color: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<Vertex>() == 24);

impl Vertex {
    /// Creates a vertex.
    #[must_use]
    pub const fn new(position: [f32; 2], color: Rgba) -> Self {
        Self { position, color }
    }
}

/// What a batch was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSource {
    /// The close-price polyline.
    Price,
    /// One output of an indicator instance.
    Output {
        /// Instance id.
        instance_id: String,
        /// Output name.
        output: String,
    },
    /// Horizontal guides of an indicator instance.
    Guides {
        /// Instance id.
        instance_id: String,
    },
    /// External trade markers.
    TradeMarkers,
}

/// Vertices sharing a source, pane and draw layer.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBatch {
    /// Origin of the batch.
    pub source: BatchSource,
    /// Pane the vertices belong to.
    pub pane: Pane,
    /// Draw order bucket.
    pub z_layer: ZLayer,
    /// Line-list vertices, two per segment.
    pub vertices: Vec<Vertex>,
}

impl VertexBatch {
    fn new(source: BatchSource, pane: Pane, z_layer: ZLayer) -> Self {
        Self {
            source,
            pane,
            z_layer,
            vertices: Vec::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba) {
        self.vertices.push(Vertex::new([x0 as f32, y0 as f32], color));
        self.vertices.push(Vertex::new([x1 as f32, y1 as f32], color));
    }

    fn segments(&mut self, segments: Vec<Segment>, color: Rgba) {
        for [a, b] in segments {
            self.vertices.push(Vertex::new(a, color));
            self.vertices.push(Vertex::new(b, color));
        }
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.vertices.len() / 2
    }
}

/// Composed geometry for one computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    /// Batches in emission order.
    pub batches: Vec<VertexBatch>,
}

impl Geometry {
    /// Total vertex count.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.batches.iter().map(|b| b.vertices.len()).sum()
    }

    /// Returns `true` if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    /// Batches from one source.
    pub fn batches_from<'a>(&'a self, source: &'a BatchSource) -> impl Iterator<Item = &'a VertexBatch> {
        self.batches.iter().filter(move |b| &b.source == source)
    }

    /// All vertices, ordered by z-layer.
    #[must_use]
    pub fn to_vertices(&self) -> Vec<Vertex> {
        let mut batches: Vec<&VertexBatch> = self.batches.iter().collect();
        batches.sort_by_key(|b| b.z_layer);
        batches.iter().flat_map(|b| b.vertices.iter().copied()).collect()
    }

    /// Flat `x, y, r, g, b, a` stream ordered by z-layer.
    #[must_use]
    pub fn to_f32_buffer(&self) -> Vec<f32> {
        bytemuck::cast_slice(&self.to_vertices()).to_vec()
    }

    /// Vertex stream as bytes, ready for upload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.to_vertices()).to_vec()
    }
}

/// Builds [`Geometry`] from a computation.
#[derive(Debug, Clone, Copy)]
pub struct GeometryComposer<'a> {
    layout: &'a PaneLayout,
    marker_scale: f64,
}

impl<'a> GeometryComposer<'a> {
    /// Creates a composer. `marker_scale` converts trade marker sizes to
    /// device units.
    #[must_use]
    pub const fn new(layout: &'a PaneLayout, marker_scale: f64) -> Self {
        Self { layout, marker_scale }
    }

    /// Composes every batch for `computation` over `bars`.
    #[must_use]
    pub fn compose(
        &self,
        bars: &[Bar],
        computation: &Computation,
        registry: &Registry,
        trade_markers: &[TradeMarker],
    ) -> Geometry {
        let mut geometry = Geometry::default();
        if bars.is_empty() {
            return geometry;
        }
        geometry.batches.push(self.price_line(bars, computation.ranges.get(Pane::Main)));

        for (instance, output) in computation.successful() {
            let Some(def) = registry.get(&instance.definition_id) else {
                continue;
            };
            let range = computation.ranges.get(instance.pane);
            for style in def.outputs() {
                let Some(series) = output.get(&style.name) else {
                    continue;
                };
                let mut batch = VertexBatch::new(
                    BatchSource::Output {
                        instance_id: instance.instance_id.clone(),
                        output: style.name.clone(),
                    },
                    instance.pane,
                    style.z_layer,
                );
                self.draw_series(&mut batch, series, style, range);
                if !batch.vertices.is_empty() {
                    geometry.batches.push(batch);
                }
            }

            let mut guides = VertexBatch::new(
                BatchSource::Guides {
                    instance_id: instance.instance_id.clone(),
                },
                instance.pane,
                ZLayer::Background,
            );
            let color = parse_color(GUIDE_COLOR);
            for &level in def.horizontal_lines().iter().filter(|l| range.contains(**l)) {
                let y = self.layout.to_pane_y(instance.pane, range, level);
                guides.line(-1.0, y, 1.0, y, color);
            }
            if !guides.vertices.is_empty() {
                geometry.batches.push(guides);
            }
        }

        if !trade_markers.is_empty() {
            geometry
                .batches
                .push(self.trade_markers(bars, trade_markers, computation.ranges.get(Pane::Main)));
        }
        geometry
    }

    fn price_line(&self, bars: &[Bar], range: ValueRange) -> VertexBatch {
        let mut batch = VertexBatch::new(BatchSource::Price, Pane::Main, ZLayer::Line);
        let color = parse_color(PRICE_COLOR);
        let n = bars.len();
        for (i, pair) in bars.windows(2).enumerate() {
            let y0 = self.layout.to_pane_y(Pane::Main, range, pair[0].close);
            let y1 = self.layout.to_pane_y(Pane::Main, range, pair[1].close);
            batch.line(to_x(i, n), y0, to_x(i + 1, n), y1, color);
        }
        batch
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_series(&self, batch: &mut VertexBatch, series: &Series, style: &OutputStyle, range: ValueRange) {
        let pane = batch.pane;
        let n = series.len();
        let mut color = parse_color(&style.color);
        if let Some(opacity) = style.opacity {
            color[3] *= opacity;
        }
        let y = |v: f64| self.layout.to_pane_y(pane, range, v);

        match style.style {
            PlotStyle::Line | PlotStyle::Area => {
                for (i, pair) in series.windows(2).enumerate() {
                    if let &[Some(a), Some(b)] = pair {
                        batch.line(to_x(i, n), y(a), to_x(i + 1, n), y(b), color);
                    }
                }
            }
            PlotStyle::Histogram | PlotStyle::Bar => {
                let base = y(0.0);
                for (i, v) in series.iter().enumerate() {
                    if let Some(v) = *v {
                        let x = to_x(i, n);
                        batch.line(x, base, x, y(v), color);
                    }
                }
            }
            PlotStyle::Marker => {
                for (i, v) in series.iter().enumerate() {
                    if let Some(v) = *v {
                        batch.segments(
                            MarkerShape::Diamond.segments(to_x(i, n) as f32, y(v) as f32, INDICATOR_MARKER_SIZE),
                            color,
                        );
                    }
                }
            }
            PlotStyle::Band | PlotStyle::Cloud | PlotStyle::Candle => {}
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn trade_markers(&self, bars: &[Bar], markers: &[TradeMarker], range: ValueRange) -> VertexBatch {
        let mut batch = VertexBatch::new(BatchSource::TradeMarkers, Pane::Main, ZLayer::Marker);
        for marker in markers {
            let Some(index) = nearest_bar(bars, marker.time) else {
                continue;
            };
            let style = marker.kind.default_style();
            let x = to_x(index, bars.len()) as f32;
            let y = self.layout.to_pane_y(Pane::Main, range, marker.price) as f32;
            let size = (marker.effective_size() * self.marker_scale) as f32;
            batch.segments(style.shape.segments(x, y, size), parse_color(style.color));
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::markers::TradeMarkerKind;
    use crate::plan::definition::{Category, IndicatorDefinition};
    use crate::plan::params::Params;
    use crate::plan::scheduler::{IndicatorInstance, Scheduler};
    use crate::series::MultiSeriesOutput;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Bar::new(i as i64 * 1_000, c, c + 1.0, c - 1.0, c, 10.0)
            })
            .collect()
    }

    fn fixed(id: &str, style: PlotStyle, pane: Pane, values: Series) -> IndicatorDefinition {
        IndicatorDefinition::new(id, id, Category::Custom, pane, move |_, _| {
            Ok(MultiSeriesOutput::new().with("v", values.clone()))
        })
        .output(OutputStyle::new("v", "#FF0000", style, ZLayer::Line))
    }

    fn compose(registry: &Registry, data: &[Bar], ids: &[&str], markers: &[TradeMarker]) -> Geometry {
        let instances: Vec<IndicatorInstance> = ids
            .iter()
            .map(|id| IndicatorInstance::with_id(*id, *id, Params::new()))
            .collect();
        let computation = Scheduler::new(registry).compute_default(data, &instances);
        let layout = PaneLayout::default();
        GeometryComposer::new(&layout, 0.01).compose(data, &computation, registry, markers)
    }

    fn output_batch<'a>(geometry: &'a Geometry, id: &str) -> Option<&'a VertexBatch> {
        let source = BatchSource::Output {
            instance_id: id.to_owned(),
            output: "v".to_owned(),
        };
        geometry.batches.iter().find(|b| b.source == source)
    }

    #[test]
    fn test_vertex_is_24_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        let geometry = Geometry {
            batches: vec![VertexBatch {
                source: BatchSource::Price,
                pane: Pane::Main,
                z_layer: ZLayer::Line,
                vertices: vec![Vertex::new([0.5, -0.5], [1.0, 0.0, 0.0, 1.0])],
            }],
        };
        assert_eq!(geometry.to_f32_buffer(), vec![0.5, -0.5, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(geometry.to_bytes().len(), 24);
    }

    #[test]
    fn test_line_skips_gaps() {
        let registry: Registry =
            [fixed("l", PlotStyle::Line, Pane::Sub1, vec![None, Some(1.0), Some(2.0), None, Some(3.0)])]
                .into_iter()
                .collect();
        let geometry = compose(&registry, &bars(5), &["l"], &[]);
        assert_eq!(output_batch(&geometry, "l").unwrap().segment_count(), 1);
    }

    #[test]
    fn test_histogram_from_zero() {
        let registry: Registry = [fixed(
            "h",
            PlotStyle::Histogram,
            Pane::Sub2,
            vec![Some(-1.0), None, Some(1.0)],
        )]
        .into_iter()
        .collect();
        let geometry = compose(&registry, &bars(3), &["h"], &[]);
        let batch = output_batch(&geometry, "h").unwrap();
        assert_eq!(batch.segment_count(), 2);
        // Range -1..1 puts zero in the middle of sub2.
        let rect = PaneLayout::default().rect(Pane::Sub2);
        let mid = ((rect.top_ndc() + rect.bottom_ndc()) / 2.0) as f32;
        assert!((batch.vertices[0].position[1] - mid).abs() < 1e-6);
        assert!((batch.vertices[0].position[0] + 1.0).abs() < 1e-6);
        assert!((batch.vertices[3].position[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_marker_is_diamond() {
        let registry: Registry = [fixed("m", PlotStyle::Marker, Pane::Main, vec![None, Some(101.0), None])]
            .into_iter()
            .collect();
        let geometry = compose(&registry, &bars(3), &["m"], &[]);
        assert_eq!(output_batch(&geometry, "m").unwrap().segment_count(), 4);
    }

    #[test]
    fn test_band_emits_nothing() {
        let registry: Registry = [fixed("b", PlotStyle::Band, Pane::Sub1, vec![Some(1.0); 4])]
            .into_iter()
            .collect();
        let geometry = compose(&registry, &bars(4), &["b"], &[]);
        assert!(output_batch(&geometry, "b").is_none());
    }

    #[test]
    fn test_guides_inside_range_only() {
        let def = fixed("g", PlotStyle::Line, Pane::Sub1, vec![Some(10.0), Some(40.0)])
            .horizontal_line(30.0)
            .horizontal_line(70.0);
        let registry: Registry = [def].into_iter().collect();
        let geometry = compose(&registry, &bars(2), &["g"], &[]);
        let source = BatchSource::Guides {
            instance_id: "g".to_owned(),
        };
        let guides: Vec<_> = geometry.batches_from(&source).collect();
        assert_eq!(guides.len(), 1);
        assert_eq!(guides[0].segment_count(), 1);
        assert_eq!(guides[0].z_layer, ZLayer::Background);
    }

    #[test]
    fn test_trade_markers_on_main() {
        let registry = Registry::new();
        let markers = [
            TradeMarker::new(TradeMarkerKind::EntryLong, 1_400, 101.0),
            TradeMarker::new(TradeMarkerKind::TakeProfit, 9_000, 104.0),
        ];
        let geometry = compose(&registry, &bars(5), &[], &markers);
        let batch = geometry.batches_from(&BatchSource::TradeMarkers).next().unwrap();
        assert_eq!(batch.segment_count(), 3 + 12);
        // Entry long sits on bar 1, size 10 * 0.01.
        let apex = batch.vertices[0].position;
        assert!((apex[0] - (-0.5)).abs() < 1e-6);
        let y = PaneLayout::default().to_pane_y(Pane::Main, ValueRange { min: 99.0, max: 105.0 }, 101.0) as f32;
        assert!((apex[1] - (y + 0.1)).abs() < 1e-6);
    }

    #[test]
    fn test_failed_instances_emit_nothing() {
        let registry = Registry::with_builtins();
        let instances = [IndicatorInstance::with_id("rsi", "r", Params::new().with("period", 999))];
        let data = bars(20);
        let computation = Scheduler::new(&registry).compute_default(&data, &instances);
        let layout = PaneLayout::default();
        let geometry = GeometryComposer::new(&layout, 0.01).compose(&data, &computation, &registry, &[]);
        assert_eq!(geometry.batches.len(), 1);
        assert_eq!(geometry.batches[0].source, BatchSource::Price);
    }

    #[test]
    fn test_z_order_flattening() {
        let mut geometry = Geometry::default();
        for (z, x) in [(ZLayer::Marker, 3.0), (ZLayer::Background, 1.0), (ZLayer::Line, 2.0)] {
            geometry.batches.push(VertexBatch {
                source: BatchSource::Price,
                pane: Pane::Main,
                z_layer: z,
                vertices: vec![Vertex::new([x, 0.0], [1.0; 4])],
            });
        }
        let xs: Vec<f32> = geometry.to_vertices().iter().map(|v| v.position[0]).collect();
        assert_eq!(xs, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_empty_bars_give_empty_geometry() {
        let registry = Registry::new();
        let geometry = compose(&registry, &[], &[], &[]);
        assert!(geometry.is_empty());
    }
}
