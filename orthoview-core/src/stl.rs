//! STL parser for binary and ASCII formats
use std::time::Instant;

use nalgebra::Point3;
use nom::{
    branch::alt,
    bytes::complete::{tag, take, take_until},
    character::complete::{multispace0, multispace1, not_line_ending},
    combinator::{eof, peek},
    number::complete::{double, le_f32, le_u16, le_u32},
    sequence::preceded,
    IResult,
};
use tracing::{debug, info, instrument};

use crate::error::{OrthoError, Result};
use crate::geometry::{MeshBuilder, TriangleMesh};

/// Size of the binary header that precedes the triangle count.
pub const HEADER_LEN: usize = 80;
/// Size of one binary facet record: normal, three vertices, attribute.
pub const RECORD_LEN: usize = 50;
/// How far past the header to look for the ASCII marker.
const DETECT_WINDOW: usize = 500;
const ASCII_MARKER: &[u8] = b"facet normal";

/// STL file flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StlFormat {
    Ascii,
    Binary,
}

/// Classify a buffer as ASCII or binary STL.
///
/// Binary files may start with the word "solid" and ASCII files may not, so
/// the marker is searched for after the binary header instead of at the start.
pub fn detect_format(data: &[u8]) -> StlFormat {
    let Some(body) = data.get(HEADER_LEN..) else {
        return StlFormat::Binary;
    };
    let window = &body[..body.len().min(DETECT_WINDOW)];
    if window.windows(ASCII_MARKER.len()).any(|w| w == ASCII_MARKER) {
        StlFormat::Ascii
    } else {
        StlFormat::Binary
    }
}

/// Detect and parse STL file (binary or ASCII)
#[instrument(skip(data), fields(bytes = data.len()))]
pub fn parse_stl(data: &[u8]) -> Result<TriangleMesh> {
    let mesh = match detect_format(data) {
        StlFormat::Ascii => parse_ascii_stl(&String::from_utf8_lossy(data))?,
        StlFormat::Binary => parse_binary_stl(data)?,
    };
    info!(
        triangles = mesh.triangle_count(),
        vertices = mesh.vertex_count(),
        non_manifold = mesh.non_manifold_edges().len(),
        "parsed STL"
    );
    Ok(mesh)
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<TriangleMesh> {
    let started = Instant::now();
    let min_len = HEADER_LEN + 4;
    if data.len() < min_len {
        return Err(OrthoError::TruncatedStl {
            expected: min_len,
            actual: data.len(),
        });
    }

    let (records, count) = le_u32::<_, nom::error::Error<&[u8]>>(&data[HEADER_LEN..])
        .map_err(|_| truncated(min_len, data.len()))?;
    let count = count as usize;
    let expected = count
        .checked_mul(RECORD_LEN)
        .and_then(|n| n.checked_add(min_len))
        .unwrap_or(usize::MAX);
    if data.len() < expected {
        return Err(truncated(expected, data.len()));
    }

    let mut builder = MeshBuilder::with_capacity(count);
    let mut input = records;
    for _ in 0..count {
        let (rest, vertices) =
            parse_facet_record(input).map_err(|_| truncated(expected, data.len()))?;
        for [x, y, z] in vertices {
            let key = [x.to_bits(), y.to_bits(), z.to_bits()];
            builder.push_vertex(key, Point3::new(x as f64, y as f64, z as f64));
        }
        input = rest;
    }

    let mesh = builder.finish();
    debug!(
        triangles = count,
        elapsed_us = started.elapsed().as_micros() as u64,
        "parsed binary STL"
    );
    Ok(mesh)
}

fn truncated(expected: usize, actual: usize) -> OrthoError {
    OrthoError::TruncatedStl { expected, actual }
}

fn parse_facet_record(input: &[u8]) -> IResult<&[u8], [[f32; 3]; 3]> {
    // The stored normal is recomputed from the vertices
    let (input, _normal) = take(12usize)(input)?;
    let (input, a) = parse_le_vector3(input)?;
    let (input, b) = parse_le_vector3(input)?;
    let (input, c) = parse_le_vector3(input)?;
    let (input, _attribute) = le_u16(input)?;
    Ok((input, [a, b, c]))
}

fn parse_le_vector3(input: &[u8]) -> IResult<&[u8], [f32; 3]> {
    let (input, x) = le_f32(input)?;
    let (input, y) = le_f32(input)?;
    let (input, z) = le_f32(input)?;
    Ok((input, [x, y, z]))
}

/// Parse an ASCII STL file
///
/// Every `vertex` line after the first `facet normal` contributes one
/// vertex; three consecutive vertices form a triangle. Vertices are merged
/// when their line text is identical.
pub fn parse_ascii_stl(input: &str) -> Result<TriangleMesh> {
    let started = Instant::now();
    let body_start = input
        .find("facet normal")
        .ok_or_else(|| OrthoError::malformed(1, "no facets found"))?;

    let mut builder: MeshBuilder<&str> = MeshBuilder::with_capacity(0);
    let mut rest = &input[body_start..];
    loop {
        let Ok((at_vertex, _)) = take_until::<_, _, nom::error::Error<&str>>("vertex")(rest) else {
            break;
        };
        let offset = input.len() - at_vertex.len();
        let starts_token = input[..offset].chars().next_back().map_or(true, char::is_whitespace);
        let parsed = if starts_token { vertex_line(at_vertex).ok() } else { None };
        let Some((after, text)) = parsed else {
            // "vertex" inside another word, such as a solid name
            rest = &at_vertex["vertex".len()..];
            continue;
        };
        let line_no = || line_number(input, at_vertex);
        let (_, (x, y, z)) = parse_vector3(text)
            .map_err(|_| OrthoError::malformed(line_no(), "expected three coordinates"))?;
        builder.push_vertex(text.trim(), Point3::new(x, y, z));
        rest = after;
    }

    if builder.pending_vertices() != 0 {
        return Err(OrthoError::malformed(
            line_number(input, rest),
            format!(
                "{} trailing vertices do not form a triangle",
                builder.pending_vertices()
            ),
        ));
    }

    let mesh = builder.finish();
    debug!(
        triangles = mesh.triangle_count(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "parsed ASCII STL"
    );
    Ok(mesh)
}

/// The text between the `vertex` keyword and the end of its line.
///
/// Fails unless the keyword is followed by whitespace or the end of input.
fn vertex_line(input: &str) -> IResult<&str, &str> {
    let (input, _) = tag("vertex")(input)?;
    let (input, _) = peek(alt((multispace1, eof)))(input)?;
    not_line_ending(input)
}

fn parse_vector3(input: &str) -> IResult<&str, (f64, f64, f64)> {
    let (input, x) = preceded(multispace0, double)(input)?;
    let (input, y) = preceded(multispace1, double)(input)?;
    let (input, z) = preceded(multispace1, double)(input)?;
    Ok((input, (x, y, z)))
}

/// 1-based line of `tail` within `full`, where `tail` is a suffix of `full`.
fn line_number(full: &str, tail: &str) -> usize {
    let offset = full.len() - tail.len();
    full.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}
