//! Plotting of optimized trajectories and the scene around them
//!
//! Series are buffered and drawn onto a single gnuplot axes when the plot is
//! saved or shown.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};
use nalgebra::DMatrix;

use crate::common::{Point2D, RoboticsError, RoboticsResult, StateLayout};
use crate::geometry::{ObjectOutline, Polygon, ReferenceLine};

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const TRAJECTORY: &str = RED;
    pub const INITIAL_GUESS: &str = GRAY;
    pub const REFERENCE: &str = "#35C788";
    pub const OBJECT: &str = BLACK;
    pub const SEED: &str = BLUE;
}

/// Hex color on a blue to red ramp for time `t` within `[t_min, t_max]`
pub fn time_color(t: f64, t_min: f64, t_max: f64) -> String {
    let span = t_max - t_min;
    let s = if span > 0.0 && t.is_finite() {
        ((t - t_min) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let red = (255.0 * s).round() as u8;
    format!("#{:02X}00{:02X}", red, 255 - red)
}

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::TRAJECTORY, "Trajectory")
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Lines {
        x: Vec<f64>,
        y: Vec<f64>,
        style: PathStyle,
    },
    Points {
        x: Vec<f64>,
        y: Vec<f64>,
        style: PointStyle,
    },
}

pub struct Visualizer {
    layers: Vec<Layer>,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_label(&mut self, label: &str) -> &mut Self {
        self.x_label = label.to_string();
        self
    }

    pub fn set_y_label(&mut self, label: &str) -> &mut Self {
        self.y_label = label.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Set aspect ratio (None for auto)
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Number of buffered series
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn plot_path_xy(&mut self, x: &[f64], y: &[f64], style: &PathStyle) -> &mut Self {
        self.layers.push(Layer::Lines {
            x: x.to_vec(),
            y: y.to_vec(),
            style: style.clone(),
        });
        self
    }

    pub fn plot_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        self.layers.push(Layer::Points {
            x: points.iter().map(|p| p.x).collect(),
            y: points.iter().map(|p| p.y).collect(),
            style: style.clone(),
        });
        self
    }

    /// Plot the planar positions of every trajectory row
    pub fn plot_trajectory(
        &mut self,
        trajectory: &DMatrix<f64>,
        layout: StateLayout,
        style: &PathStyle,
    ) -> &mut Self {
        let (x, y): (Vec<f64>, Vec<f64>) = (0..trajectory.nrows())
            .map(|row| {
                let p = layout.position(trajectory, row);
                (p.x, p.y)
            })
            .unzip();
        self.plot_path_xy(&x, &y, style)
    }

    /// Plot a closed polygon outline
    pub fn plot_polygon(&mut self, polygon: &Polygon, style: &PathStyle) -> &mut Self {
        let (x, y): (Vec<f64>, Vec<f64>) = polygon.points().iter().map(|p| (p.x, p.y)).unzip();
        self.plot_path_xy(&x, &y, style)
    }

    pub fn plot_reference_line(&mut self, line: &ReferenceLine) -> &mut Self {
        let (x, y): (Vec<f64>, Vec<f64>) = line.points().iter().map(|p| (p.x, p.y)).unzip();
        let style = PathStyle::new(colors::REFERENCE, "Reference").with_line_width(1.0);
        self.plot_path_xy(&x, &y, &style)
    }

    /// Plot a moving outline at each of `times`, colored from blue (first)
    /// to red (last). Only the first snapshot carries `caption`.
    pub fn plot_outline(
        &mut self,
        outline: &ObjectOutline,
        times: &[f64],
        caption: &str,
    ) -> RoboticsResult<&mut Self> {
        let t_min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let t_max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (i, &t) in times.iter().enumerate() {
            let polygon = outline.query(t)?;
            let label = if i == 0 { caption } else { "" };
            let style = PathStyle::new(&time_color(t, t_min, t_max), label).with_line_width(1.0);
            self.plot_polygon(&polygon, &style);
        }
        Ok(self)
    }

    pub fn show(&mut self) -> RoboticsResult<()> {
        let mut figure = self.render();
        figure
            .show()
            .map(|_| ())
            .map_err(|e| RoboticsError::Visualization(e.to_string()))
    }

    pub fn save_png(&mut self, path: &str, width: u32, height: u32) -> RoboticsResult<()> {
        let mut figure = self.render();
        figure
            .save_to_png(path, width, height)
            .map_err(|e| RoboticsError::Visualization(e.to_string()))
    }

    pub fn save_svg(&mut self, path: &str) -> RoboticsResult<()> {
        let mut figure = self.render();
        figure
            .save_to_svg(path, 800, 600)
            .map_err(|e| RoboticsError::Visualization(e.to_string()))
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        let axes = figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Lines { x, y, style } => {
                    axes.lines(
                        x,
                        y,
                        &[
                            Caption(style.caption.as_str()),
                            Color(style.color.as_str()),
                            LineWidth(style.line_width),
                        ],
                    );
                }
                Layer::Points { x, y, style } => {
                    axes.points(
                        x,
                        y,
                        &[
                            Caption(style.caption.as_str()),
                            Color(style.color.as_str()),
                            PointSymbol(style.symbol),
                            PointSize(style.size),
                        ],
                    );
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.x_label, &[]);
        axes.set_y_label(&self.y_label, &[]);

        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
        figure
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_color_ramp() {
        assert_eq!(time_color(0.0, 0.0, 4.0), "#0000FF");
        assert_eq!(time_color(4.0, 0.0, 4.0), "#FF0000");
        assert_eq!(time_color(9.0, 0.0, 4.0), "#FF0000");
        assert_eq!(time_color(2.0, 2.0, 2.0), "#0000FF");
    }

    #[test]
    fn test_path_style() {
        let style = PathStyle::new(colors::RED, "Test Path").with_line_width(3.0);
        assert_eq!(style.line_width, 3.0);
        assert_eq!(style.color, colors::RED);
    }

    #[test]
    fn test_layers_are_buffered() {
        let mut vis = Visualizer::new();
        let trajectory = DMatrix::from_row_slice(2, 4, &[0.0, 0.0, 0.0, 1.0, 1.0, 0.5, 0.0, 1.0]);
        let layout = StateLayout {
            x: 0,
            y: 1,
            heading: Some(2),
            speed: Some(3),
        };
        let square = Polygon::rectangle(Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)).unwrap();
        let mut outline = ObjectOutline::new();
        outline.add(square.clone(), 0.0).unwrap();
        outline.add(square.translated(1.0, 0.0), 1.0).unwrap();

        vis.plot_trajectory(&trajectory, layout, &PathStyle::default())
            .plot_polygon(&square, &PathStyle::new(colors::OBJECT, "Object"));
        vis.plot_outline(&outline, &[0.0, 0.5, 1.0], "Moving").unwrap();
        assert_eq!(vis.num_layers(), 5);

        let empty = ObjectOutline::new();
        assert!(vis.plot_outline(&empty, &[0.0], "Empty").is_err());
    }
}
