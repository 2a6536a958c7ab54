use super::{Mesh, MeshError, MeshFace, MeshFormat};
use crate::core::geometry::{RgbColor, Vec3};
use std::io::{BufRead, Write};

/// ASCII Wavefront OBJ with the common `v x y z r g b` vertex color extension.
///
/// Only `v` and `f` records are interpreted; texture coordinates, normals,
/// groups and material statements are skipped.
pub struct ObjFile;

fn parse_float(token: &str, line: usize) -> Result<f32, MeshError> {
    token.parse().map_err(|_| MeshError::Parse {
        line,
        message: format!("invalid number '{token}'"),
    })
}

/// Resolves a 1-based (or negative, relative) OBJ index to a 0-based index.
fn resolve_index(token: &str, vertex_count: usize, line: usize) -> Result<usize, MeshError> {
    let raw = token.split('/').next().unwrap_or_default();
    let index: i64 = raw.parse().map_err(|_| MeshError::Parse {
        line,
        message: format!("invalid face index '{token}'"),
    })?;
    let resolved = match index {
        i if i > 0 => i - 1,
        i if i < 0 => vertex_count as i64 + i,
        _ => -1,
    };
    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(MeshError::Parse {
            line,
            message: format!("face index {index} is out of range for {vertex_count} vertices"),
        });
    }
    Ok(resolved as usize)
}

impl MeshFormat for ObjFile {
    fn read_from(reader: &mut impl BufRead) -> Result<Mesh, MeshError> {
        let mut mesh = Mesh::default();
        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let values = tokens
                        .map(|t| parse_float(t, line_num))
                        .collect::<Result<Vec<_>, _>>()?;
                    if values.len() < 3 {
                        return Err(MeshError::Parse {
                            line: line_num,
                            message: "vertex record needs three coordinates".to_string(),
                        });
                    }
                    mesh.vertices.push(Vec3::new(values[0], values[1], values[2]));
                    mesh.vertex_colors.push(
                        (values.len() >= 6).then(|| RgbColor::new(values[3], values[4], values[5])),
                    );
                }
                Some("f") => {
                    let indices = tokens
                        .map(|t| resolve_index(t, mesh.vertices.len(), line_num))
                        .collect::<Result<Vec<_>, _>>()?;
                    if indices.len() < 3 {
                        return Err(MeshError::Parse {
                            line: line_num,
                            message: "face record needs at least three vertices".to_string(),
                        });
                    }
                    mesh.faces.push(MeshFace {
                        indices,
                        color: None,
                    });
                }
                _ => {}
            }
        }
        Ok(mesh)
    }

    fn write_to(mesh: &Mesh, writer: &mut impl Write) -> Result<(), MeshError> {
        writeln!(writer, "# Helios model export")?;
        for (i, v) in mesh.vertices.iter().enumerate() {
            match mesh.vertex_colors.get(i).copied().flatten() {
                Some(c) => writeln!(writer, "v {} {} {} {} {} {}", v.x, v.y, v.z, c.r, c.g, c.b)?,
                None => writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?,
            }
        }
        for face in &mesh.faces {
            write!(writer, "f")?;
            for index in &face.indices {
                write!(writer, " {}", index + 1)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}
