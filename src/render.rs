use crate::tree::{Node, NodeTree};
use anyhow::{Context, Result};
use image::ImageEncoder;
use log::debug;
use plotters::prelude::*;

/// Node box size in layout units
const NODE_WIDTH: f64 = 140.0;
const NODE_HEIGHT: f64 = 80.0;
const SOCKET_SPACING: f64 = 14.0;
const MARGIN: f64 = 40.0;
/// Largest bitmap the renderer allocates
const MAX_PIXELS: u64 = 64 * 1024 * 1024;

pub struct RenderConfig {
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            title: None,
            width: 1024,
            height: 768,
        }
    }
}

/// Size in bytes of an RGB buffer for the configured image
fn buffer_len(config: &RenderConfig) -> Result<usize> {
    if config.width == 0 || config.height == 0 {
        anyhow::bail!("Image size {}x{} is empty", config.width, config.height);
    }
    let pixels = u64::from(config.width) * u64::from(config.height);
    if pixels > MAX_PIXELS {
        anyhow::bail!(
            "Image size {}x{} exceeds the limit of {MAX_PIXELS} pixels",
            config.width,
            config.height
        );
    }
    usize::try_from(pixels * 3).context("Image buffer does not fit in memory")
}

fn socket_y(node: &Node, socket: usize) -> f64 {
    node.location[1] - 24.0 - socket as f64 * SOCKET_SPACING
}

/// Draw a tree as boxes joined by link lines and encode it as PNG
pub fn render_tree(tree: &NodeTree, config: &RenderConfig) -> Result<Vec<u8>> {
    if tree.nodes.is_empty() {
        anyhow::bail!("Cannot draw tree `{}` with no nodes", tree.name);
    }
    debug!(
        "rendering `{}` at {}x{}",
        tree.name, config.width, config.height
    );

    let x_min = tree
        .nodes
        .iter()
        .map(|n| n.location[0])
        .fold(f64::INFINITY, f64::min);
    let x_max = tree
        .nodes
        .iter()
        .map(|n| n.location[0])
        .fold(f64::NEG_INFINITY, f64::max);
    let y_min = tree
        .nodes
        .iter()
        .map(|n| n.location[1])
        .fold(f64::INFINITY, f64::min);
    let y_max = tree
        .nodes
        .iter()
        .map(|n| n.location[1])
        .fold(f64::NEG_INFINITY, f64::max);
    let x_range = (x_min - MARGIN)..(x_max + NODE_WIDTH + MARGIN);
    let y_range = (y_min - NODE_HEIGHT - MARGIN)..(y_max + MARGIN);

    let mut buffer = vec![0u8; buffer_len(config)?];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (config.width, config.height))
            .into_drawing_area();

        root.fill(&WHITE).context("Failed to fill background")?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                config.title.as_deref().unwrap_or(&tree.name),
                ("sans-serif", 20),
            )
            .build_cartesian_2d(x_range, y_range)
            .context("Failed to build diagram")?;

        chart
            .draw_series(tree.links.iter().map(|link| {
                let from = tree.node(link.from_node);
                let to = tree.node(link.to_node);
                PathElement::new(
                    vec![
                        (from.location[0] + NODE_WIDTH, socket_y(from, link.from_socket)),
                        (to.location[0], socket_y(to, link.to_socket)),
                    ],
                    BLUE.mix(0.6).stroke_width(2),
                )
            }))
            .context("Failed to draw links")?;

        chart
            .draw_series(tree.nodes.iter().map(|node| {
                let [x, y] = node.location;
                Rectangle::new(
                    [(x, y), (x + NODE_WIDTH, y - NODE_HEIGHT)],
                    RGBColor(235, 235, 240).filled(),
                )
            }))
            .context("Failed to draw nodes")?;

        chart
            .draw_series(tree.nodes.iter().map(|node| {
                let [x, y] = node.location;
                Rectangle::new([(x, y), (x + NODE_WIDTH, y - NODE_HEIGHT)], BLACK.stroke_width(1))
            }))
            .context("Failed to draw node borders")?;

        chart
            .draw_series(tree.nodes.iter().map(|node| {
                let [x, y] = node.location;
                Text::new(
                    node.title().to_string(),
                    (x + 6.0, y - 6.0),
                    ("sans-serif", 13).into_font(),
                )
            }))
            .context("Failed to draw node titles")?;

        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(
                &buffer,
                config.width,
                config.height,
                image::ColorType::Rgb8,
            )
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}
