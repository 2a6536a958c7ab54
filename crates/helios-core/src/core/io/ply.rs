use super::{Mesh, MeshError, MeshFace, MeshFormat};
use crate::core::geometry::{RgbColor, Vec3};
use std::io::{BufRead, Write};

/// ASCII PLY with per-vertex `uchar` colors.
pub struct PlyFile;

#[derive(Debug, Default)]
struct Header {
    vertex_count: usize,
    face_count: usize,
    vertex_properties: Vec<String>,
}

fn parse_error(line: usize, message: impl Into<String>) -> MeshError {
    MeshError::Parse {
        line,
        message: message.into(),
    }
}

fn read_header(lines: &mut impl Iterator<Item = (usize, std::io::Result<String>)>) -> Result<Header, MeshError> {
    let mut header = Header::default();
    let mut current_element = String::new();
    let mut saw_magic = false;
    for (line_num, line_res) in lines {
        let line = line_res?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["ply"] => saw_magic = true,
            ["format", format, ..] if *format != "ascii" => {
                return Err(parse_error(line_num, format!("unsupported PLY format '{format}'")));
            }
            ["element", name, count] => {
                let count: usize = count
                    .parse()
                    .map_err(|_| parse_error(line_num, format!("invalid element count '{count}'")))?;
                match *name {
                    "vertex" => header.vertex_count = count,
                    "face" => header.face_count = count,
                    _ => {}
                }
                current_element = name.to_string();
            }
            ["property", .., name] if current_element == "vertex" => {
                header.vertex_properties.push(name.to_string());
            }
            ["end_header"] => {
                if !saw_magic {
                    return Err(parse_error(line_num, "missing 'ply' magic line"));
                }
                return Ok(header);
            }
            _ => {}
        }
    }
    Err(parse_error(0, "missing 'end_header'"))
}

impl MeshFormat for PlyFile {
    fn read_from(reader: &mut impl BufRead) -> Result<Mesh, MeshError> {
        let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));
        let header = read_header(&mut lines)?;
        let position = |name: &str| header.vertex_properties.iter().position(|p| p == name);
        let (ix, iy, iz) = match (position("x"), position("y"), position("z")) {
            (Some(x), Some(y), Some(z)) => (x, y, z),
            _ => return Err(parse_error(0, "vertex element lacks x/y/z properties")),
        };
        let color_columns = match (position("red"), position("green"), position("blue")) {
            (Some(r), Some(g), Some(b)) => Some((r, g, b)),
            _ => None,
        };

        let mut mesh = Mesh::default();
        let mut data = lines.filter(|(_, l)| l.as_ref().map_or(true, |s| !s.trim().is_empty()));
        for _ in 0..header.vertex_count {
            let (line_num, line) = data
                .next()
                .ok_or_else(|| parse_error(0, "unexpected end of vertex data"))?;
            let line = line?;
            let values = line
                .split_whitespace()
                .map(|t| t.parse::<f32>().map_err(|_| parse_error(line_num, format!("invalid number '{t}'"))))
                .collect::<Result<Vec<_>, _>>()?;
            if values.len() < header.vertex_properties.len() {
                return Err(parse_error(line_num, "vertex record is missing properties"));
            }
            mesh.vertices.push(Vec3::new(values[ix], values[iy], values[iz]));
            mesh.vertex_colors.push(
                color_columns.map(|(r, g, b)| RgbColor::new(values[r] / 255.0, values[g] / 255.0, values[b] / 255.0)),
            );
        }
        for _ in 0..header.face_count {
            let (line_num, line) = data
                .next()
                .ok_or_else(|| parse_error(0, "unexpected end of face data"))?;
            let line = line?;
            let values = line
                .split_whitespace()
                .map(|t| t.parse::<usize>().map_err(|_| parse_error(line_num, format!("invalid index '{t}'"))))
                .collect::<Result<Vec<_>, _>>()?;
            let Some((&count, indices)) = values.split_first() else {
                return Err(parse_error(line_num, "empty face record"));
            };
            if count < 3 || indices.len() < count {
                return Err(parse_error(line_num, "face record needs at least three indices"));
            }
            if let Some(bad) = indices[..count].iter().find(|i| **i >= mesh.vertices.len()) {
                return Err(parse_error(line_num, format!("face index {bad} is out of range")));
            }
            mesh.faces.push(MeshFace {
                indices: indices[..count].to_vec(),
                color: None,
            });
        }
        Ok(mesh)
    }

    fn write_to(mesh: &Mesh, writer: &mut impl Write) -> Result<(), MeshError> {
        writeln!(writer, "ply")?;
        writeln!(writer, "format ascii 1.0")?;
        writeln!(writer, "comment Helios model export")?;
        writeln!(writer, "element vertex {}", mesh.vertices.len())?;
        for axis in ["x", "y", "z"] {
            writeln!(writer, "property float {axis}")?;
        }
        for channel in ["red", "green", "blue"] {
            writeln!(writer, "property uchar {channel}")?;
        }
        writeln!(writer, "element face {}", mesh.faces.len())?;
        writeln!(writer, "property list uchar int vertex_indices")?;
        writeln!(writer, "end_header")?;
        let to_byte = |c: f32| (c * 255.0).round() as u8;
        for (i, v) in mesh.vertices.iter().enumerate() {
            let c = mesh
                .vertex_colors
                .get(i)
                .copied()
                .flatten()
                .unwrap_or(RgbColor::WHITE);
            writeln!(
                writer,
                "{} {} {} {} {} {}",
                v.x,
                v.y,
                v.z,
                to_byte(c.r),
                to_byte(c.g),
                to_byte(c.b)
            )?;
        }
        for face in &mesh.faces {
            write!(writer, "{}", face.indices.len())?;
            for index in &face.indices {
                write!(writer, " {index}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}
