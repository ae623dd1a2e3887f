//! layout.rs
//!
//! Geometry of the seating chart: where each seat sits around its table and
//! an SVG rendering of a chart snapshot.

use serde::Serialize;
use std::f64::consts::PI;
use std::fmt::{self, Write};

use crate::models::{ContainerType, SeatRef, SeatStatus, SeatType, SeatingChart, Table, TableShape};

/// Distance between a table edge and the centre of its seats.
pub const SEAT_OFFSET: f64 = 15.0;
pub const SEAT_RADIUS: f64 = 6.0;
const CHART_MARGIN: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeatPosition {
    pub seat: SeatRef,
    pub x: f64,
    pub y: f64,
}

/// Seat centres for a table, ordered by seat number.
///
/// Round tables place the first seat at 12 o'clock and continue clockwise.
/// Rectangular tables seat the larger half along the top edge and the rest
/// along the bottom edge.
pub fn seat_positions(table: &Table) -> Vec<SeatPosition> {
    let mut numbers: Vec<i32> = table.seats.iter().map(|s| s.seat_number).collect();
    numbers.sort_unstable();
    let n = numbers.len();
    if n == 0 {
        return Vec::new();
    }

    let cx = table.x + table.width / 2.0;
    let cy = table.y + table.height / 2.0;

    match table.shape {
        TableShape::Round => {
            let radius = table.width.min(table.height) / 2.0 + SEAT_OFFSET;
            numbers
                .iter()
                .enumerate()
                .map(|(i, number)| {
                    let angle = -PI / 2.0 + 2.0 * PI * i as f64 / n as f64;
                    SeatPosition {
                        seat: SeatRef::new(table.id, *number),
                        x: cx + radius * angle.cos(),
                        y: cy + radius * angle.sin(),
                    }
                })
                .collect()
        }
        TableShape::Rectangle => {
            let top = n.div_ceil(2);
            let bottom = n - top;
            numbers
                .iter()
                .enumerate()
                .map(|(i, number)| {
                    let (slot, count, y) = if i < top {
                        (i, top, table.y - SEAT_OFFSET)
                    } else {
                        (i - top, bottom, table.y + table.height + SEAT_OFFSET)
                    };
                    SeatPosition {
                        seat: SeatRef::new(table.id, *number),
                        x: table.x + table.width * (slot + 1) as f64 / (count + 1) as f64,
                        y,
                    }
                })
                .collect()
        }
    }
}

/// Width and height that fit every table with its seats.
pub fn chart_extent(chart: &SeatingChart) -> (f64, f64) {
    chart
        .sections
        .iter()
        .flat_map(|section| section.tables.iter())
        .fold((0.0f64, 0.0f64), |(w, h), table| {
            (
                w.max(table.x + table.width + SEAT_OFFSET + SEAT_RADIUS),
                h.max(table.y + table.height + SEAT_OFFSET + SEAT_RADIUS),
            )
        })
}

fn status_fill<'a>(status: SeatStatus, section_color: &'a str) -> &'a str {
    match status {
        SeatStatus::Available => section_color,
        SeatStatus::Held => "#f5a623",
        SeatStatus::Sold => "#9b9b9b",
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// SVG document for a chart snapshot. General-admission sections are not drawn.
pub fn render_svg(chart: &SeatingChart) -> String {
    let mut svg = String::new();
    // writing into a String never fails
    write_svg(&mut svg, chart).map(|()| svg).unwrap_or_default()
}

pub fn write_svg<W: Write>(out: &mut W, chart: &SeatingChart) -> fmt::Result {
    let (width, height) = chart_extent(chart);
    write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width + CHART_MARGIN,
        h = height + CHART_MARGIN,
    )?;
    write!(out, "<title>{}</title>", escape(&chart.name))?;

    for section in &chart.sections {
        match section.container_type {
            ContainerType::GeneralAdmission => continue,
            ContainerType::Tables => {}
        }
        let color = escape(&section.color);
        write!(out, r#"<g data-section="{}">"#, section.id)?;
        for table in &section.tables {
            write_table(out, table, &color)?;
        }
        out.write_str("</g>")?;
    }

    out.write_str("</svg>")
}

fn write_table<W: Write>(out: &mut W, table: &Table, color: &str) -> fmt::Result {
    match table.shape {
        TableShape::Round => write!(
            out,
            r##"<ellipse cx="{}" cy="{}" rx="{}" ry="{}" fill="#ffffff" stroke="{}"/>"##,
            table.x + table.width / 2.0,
            table.y + table.height / 2.0,
            table.width / 2.0,
            table.height / 2.0,
            color,
        )?,
        TableShape::Rectangle => write!(
            out,
            r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#ffffff" stroke="{}"/>"##,
            table.x, table.y, table.width, table.height, color,
        )?,
    }
    write!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle">{}</text>"#,
        table.x + table.width / 2.0,
        table.y + table.height / 2.0,
        table.table_number,
    )?;

    for position in seat_positions(table) {
        let Some(seat) = table.seats.iter().find(|s| s.seat_number == position.seat.seat_number) else {
            continue;
        };
        let fill = status_fill(seat.status, color);
        match seat.seat_type {
            SeatType::Standard => write!(
                out,
                r#"<circle data-seat="{}" cx="{:.2}" cy="{:.2}" r="{}" fill="{}"/>"#,
                position.seat, position.x, position.y, SEAT_RADIUS, fill,
            )?,
            SeatType::Vip => write!(
                out,
                r##"<circle data-seat="{}" cx="{:.2}" cy="{:.2}" r="{}" fill="{}" stroke="#d4af37" stroke-width="2"/>"##,
                position.seat, position.x, position.y, SEAT_RADIUS, fill,
            )?,
            SeatType::Wheelchair => write!(
                out,
                r#"<rect data-seat="{}" x="{:.2}" y="{:.2}" width="{}" height="{}" fill="{}"/>"#,
                position.seat,
                position.x - SEAT_RADIUS,
                position.y - SEAT_RADIUS,
                SEAT_RADIUS * 2.0,
                SEAT_RADIUS * 2.0,
                fill,
            )?,
        }
    }
    Ok(())
}
