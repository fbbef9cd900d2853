//! DXF export of outlines for cutting.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::curve::Outline;

/// Outline length worth exporting for fabrication.
pub const DXF_OUTLINE_LEN: usize = 300;

const LAYER: &str = "LINES";
const COLOR: u8 = 7;

/// Write `outline` as a closed chain of `LINE` entities.
///
/// The last point is joined back to the first. Coordinates are written in
/// the outline's units (mm).
pub fn outline_to_dxf<W: Write>(outline: &Outline, w: &mut W) -> std::io::Result<()> {
    writeln!(w, "0\nSECTION\n2\nTABLES")?;
    writeln!(w, "0\nTABLE\n2\nLAYER\n70\n1")?;
    writeln!(w, "0\nLAYER\n2\n{}\n70\n0\n62\n{}\n6\nCONTINUOUS", LAYER, COLOR)?;
    writeln!(w, "0\nENDTAB\n0\nENDSEC")?;

    writeln!(w, "0\nSECTION\n2\nENTITIES")?;
    let n = outline.points.len();
    if n >= 2 {
        for i in 0..n {
            let a = outline.points[i];
            let b = outline.points[(i + 1) % n];
            writeln!(w, "0\nLINE\n8\n{}\n62\n{}", LAYER, COLOR)?;
            writeln!(w, "10\n{}\n20\n{}\n30\n0.0", a.x, a.y)?;
            writeln!(w, "11\n{}\n21\n{}\n31\n0.0", b.x, b.y)?;
        }
    }
    writeln!(w, "0\nENDSEC\n0\nEOF")?;
    Ok(())
}

/// Export `outline` to a DXF file at `path`.
pub fn write_dxf<P: AsRef<Path>>(outline: &Outline, path: P) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    outline_to_dxf(outline, &mut file)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn square() -> Outline {
        Outline {
            points: vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
        }
    }

    #[test]
    fn one_line_per_edge_and_closed() {
        let mut buf = Vec::new();
        outline_to_dxf(&square(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text.matches("\nLINE\n").count(), 4);
        assert!(text.contains("ENTITIES"));
        assert!(text.trim_end().ends_with("EOF"));
        // closing edge runs from (0, 10) back to the origin
        assert!(text.contains("10\n0\n20\n10\n30\n0.0\n11\n0\n21\n0\n31\n0.0"));
    }

    #[test]
    fn empty_outline_has_no_entities() {
        let mut buf = Vec::new();
        outline_to_dxf(&Outline { points: Vec::new() }, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.matches("\nLINE\n").count(), 0);
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bell.dxf");
        write_dxf(&square(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("LINES"));
    }
}
