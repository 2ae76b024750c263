//! Point file input and ESRI ASCII grid output

use anyhow::{bail, Context, Result};
use gridder_algorithms::interpolation::PointSet;
use gridder_core::{Raster, RasterElement};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Read `x y z` samples, one per line, separated by commas or whitespace.
///
/// Blank lines and lines starting with `#` are skipped. The first remaining
/// line may be a column header and is skipped when it does not parse; any
/// later unparsable line is an error. Columns past the third are ignored.
pub fn read_xyz(path: &Path) -> Result<PointSet<'static>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_xyz_from(BufReader::new(file))
}

fn read_xyz_from<R: BufRead>(reader: R) -> Result<PointSet<'static>> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    let mut first = true;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read point file")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        let header = std::mem::replace(&mut first, false);
        if fields.len() < 3 {
            bail!("Line {}: expected x, y, z, got '{}'", lineno + 1, line);
        }
        let parsed: Result<Vec<f64>, _> = fields[..3].iter().map(|s| s.parse::<f64>()).collect();
        match parsed {
            Ok(v) => {
                x.push(v[0]);
                y.push(v[1]);
                z.push(v[2]);
            }
            Err(_) if header => continue,
            Err(e) => bail!("Line {}: {} in '{}'", lineno + 1, e, line),
        }
    }

    if x.is_empty() {
        bail!("No points found");
    }
    PointSet::owned(x, y, z).context("Invalid point set")
}

/// Write `raster` as an ESRI ASCII grid, northernmost row first.
///
/// Square cells are written with `cellsize`, others with `dx` / `dy`.
pub fn write_ascii_grid<T>(raster: &Raster<T>, path: &Path) -> Result<()>
where
    T: RasterElement + Display,
{
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_ascii_grid_to(raster, &mut out)?;
    out.flush().context("Failed to write output")?;
    Ok(())
}

fn write_ascii_grid_to<T, W>(raster: &Raster<T>, out: &mut W) -> Result<()>
where
    T: RasterElement + Display,
    W: Write,
{
    let (rows, cols) = raster.shape();
    let gt = raster.transform();
    let dx = gt.pixel_width;
    let dy = gt.pixel_height;

    writeln!(out, "ncols        {}", cols)?;
    writeln!(out, "nrows        {}", rows)?;
    writeln!(out, "xllcorner    {}", gt.origin_x)?;
    writeln!(out, "yllcorner    {}", gt.origin_y)?;
    if (dx - dy).abs() <= 1e-10 * dx.abs().max(dy.abs()) {
        writeln!(out, "cellsize     {}", dx)?;
    } else {
        writeln!(out, "dx           {}", dx)?;
        writeln!(out, "dy           {}", dy)?;
    }
    if let Some(nodata) = raster.nodata() {
        writeln!(out, "NODATA_value {}", nodata)?;
    }

    let view = raster.view();
    for row in (0..rows).rev() {
        let line: Vec<String> = view.row(row).iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gridder_core::GeoTransform;
    use std::io::Cursor;

    #[test]
    fn test_read_mixed_separators() {
        let text = "# survey\nx,y,z\n0,0,10\n10 0 20\n\n0,\t10, 30, extra\n";
        let pts = read_xyz_from(Cursor::new(text)).unwrap();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts.x(), &[0.0, 10.0, 0.0]);
        assert_eq!(pts.z(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_read_rejects_bad_lines() {
        assert!(read_xyz_from(Cursor::new("0,0,1\n1,1,oops\n")).is_err());
        assert!(read_xyz_from(Cursor::new("0,0\n")).is_err());
        assert!(read_xyz_from(Cursor::new("# nothing\n")).is_err());
    }

    #[test]
    fn test_only_one_header_line() {
        let err = read_xyz_from(Cursor::new("x,y,z\nfoo,bar,baz\n0,0,1\n")).unwrap_err();
        assert!(err.to_string().starts_with("Line 2:"), "{err}");
        // Comments before the header do not count as the header.
        let pts = read_xyz_from(Cursor::new("# a\n\n# b\neast north height\n1 2 3\n")).unwrap();
        assert_eq!(pts.len(), 1);
    }

    #[test]
    fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.xyz");
        std::fs::write(&path, "1.5 2.5 3.5\n").unwrap();
        let pts = read_xyz(&path).unwrap();
        assert_relative_eq!(pts.y()[0], 2.5);
        assert!(read_xyz(&dir.path().join("missing.xyz")).is_err());
    }

    #[test]
    fn test_ascii_grid_is_north_up() {
        let mut raster = Raster::from_vec(vec![1i16, 2, 3, 4, 5, 6], 2, 3).unwrap();
        raster.set_transform(GeoTransform::new(100.0, 200.0, 10.0, 10.0));
        raster.set_nodata(Some(-9999));

        let mut buf = Vec::new();
        write_ascii_grid_to(&raster, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ncols        3");
        assert_eq!(lines[4], "cellsize     10");
        assert_eq!(lines[5], "NODATA_value -9999");
        // Row 0 lies along the southern edge, so it comes last.
        assert_eq!(lines[6], "4 5 6");
        assert_eq!(lines[7], "1 2 3");
    }

    #[test]
    fn test_ascii_grid_rectangular_cells() {
        let mut raster = Raster::from_vec(vec![0.5f32; 4], 2, 2).unwrap();
        raster.set_transform(GeoTransform::new(0.0, 0.0, 2.0, 1.0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.asc");
        write_ascii_grid(&raster, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("dx           2\n"));
        assert!(text.contains("dy           1\n"));
        assert!(!text.contains("NODATA_value"));
        assert!(text.ends_with("0.5 0.5\n"));
    }
}
