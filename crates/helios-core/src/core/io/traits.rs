use super::{Mesh, MeshError};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Common interface of the polygon mesh formats exchanged with the context.
pub trait MeshFormat {
    /// Parses a mesh from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the content is malformed.
    fn read_from(reader: &mut impl BufRead) -> Result<Mesh, MeshError>;

    /// Serializes a mesh to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(mesh: &Mesh, writer: &mut impl Write) -> Result<(), MeshError>;

    /// Reads a mesh from a file path.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the file to read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Mesh, MeshError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a mesh to a file path, creating or truncating the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<(), MeshError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(mesh, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
