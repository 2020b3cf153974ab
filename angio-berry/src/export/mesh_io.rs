//! 网格文件编码: STL (二进制 / ASCII), Wavefront OBJ, ASCII PLY (借助 `ply-rs`).

use super::MeshFormat;
use crate::surface::{triangle_normal, Mesh};
use crate::{AngioError, AngioResult};
use nalgebra::{Point3, Vector3};
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// 二进制 STL 文件头长度.
const STL_HEADER_SIZE: usize = 80;

/// 表明一个可以被编码为常见网格交换格式的对象.
pub trait MeshWrite {
    /// 以 `format` 格式写入 `writer`.
    fn write_to<W: Write>(&self, writer: W, format: MeshFormat) -> io::Result<()>;

    /// 以 `format` 格式保存到 `path`. 已存在的文件会被覆盖.
    fn save<P: AsRef<Path>>(&self, path: P, format: MeshFormat) -> AngioResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| AngioError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, format)
            .and_then(|_| writer.flush())
            .map_err(|e| AngioError::io(path, e))
    }
}

impl MeshWrite for Mesh {
    fn write_to<W: Write>(&self, writer: W, format: MeshFormat) -> io::Result<()> {
        match format {
            MeshFormat::Stl => write_stl_binary(self, writer),
            MeshFormat::StlAscii => write_stl_ascii(self, writer),
            MeshFormat::Obj => write_obj(self, writer),
            MeshFormat::Ply => write_ply(self, writer),
        }
    }
}

/// 单位法向. 退化三角形返回零向量.
#[inline]
fn unit_normal(t: &[Point3<f64>; 3]) -> Vector3<f64> {
    let n = triangle_normal(t);
    let len = n.norm();
    if len > f64::EPSILON {
        n / len
    } else {
        Vector3::zeros()
    }
}

fn write_stl_binary<W: Write>(mesh: &Mesh, mut writer: W) -> io::Result<()> {
    let mut header = [b' '; STL_HEADER_SIZE];
    let text = b"binary STL exported by angio-berry";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;

    let count = u32::try_from(mesh.triangle_count())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "三角形个数超出 STL 上限"))?;
    writer.write_all(&count.to_le_bytes())?;

    for t in mesh.triangles() {
        let n = unit_normal(&t);
        for v in [n.x, n.y, n.z] {
            writer.write_all(&(v as f32).to_le_bytes())?;
        }
        for p in t.iter() {
            for v in [p.x, p.y, p.z] {
                writer.write_all(&(v as f32).to_le_bytes())?;
            }
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

fn write_stl_ascii<W: Write>(mesh: &Mesh, mut writer: W) -> io::Result<()> {
    writeln!(writer, "solid vessel")?;
    for t in mesh.triangles() {
        let n = unit_normal(&t);
        writeln!(writer, "  facet normal {:.6e} {:.6e} {:.6e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for p in t.iter() {
            writeln!(writer, "      vertex {:.6e} {:.6e} {:.6e}", p.x, p.y, p.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid vessel")?;
    Ok(())
}

fn write_obj<W: Write>(mesh: &Mesh, mut writer: W) -> io::Result<()> {
    writeln!(writer, "# angio-berry")?;
    for p in mesh.vertices() {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    // OBJ 的索引从 1 开始.
    for [a, b, c] in mesh.faces() {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

fn write_ply<W: Write>(mesh: &Mesh, mut writer: W) -> io::Result<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header.comments.push("angio-berry".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    vertex_def.count = mesh.vertex_count();
    ply.header.elements.add(vertex_def);
    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    face_def.count = mesh.triangle_count();
    ply.header.elements.add(face_def);

    let vertices = mesh
        .vertices()
        .iter()
        .map(|p| {
            let mut e = DefaultElement::new();
            e.insert("x".to_string(), Property::Double(p.x));
            e.insert("y".to_string(), Property::Double(p.y));
            e.insert("z".to_string(), Property::Double(p.z));
            e
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let faces = mesh
        .faces()
        .iter()
        .map(|f| {
            let mut e = DefaultElement::new();
            e.insert("vertex_indices".to_string(), Property::ListUInt(f.to_vec()));
            e
        })
        .collect();
    ply.payload.insert("face".to_string(), faces);

    Writer::new().write_ply(&mut writer, &mut ply)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::MeshWrite;
    use crate::export::MeshFormat;
    use crate::surface::Mesh;
    use nalgebra::Point3;

    fn triangle() -> Mesh {
        Mesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    fn encode(mesh: &Mesh, format: MeshFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        mesh.write_to(&mut buf, format).unwrap();
        buf
    }

    #[test]
    fn test_stl_binary_layout() {
        let buf = encode(&triangle(), MeshFormat::Stl);
        assert_eq!(buf.len(), 80 + 4 + 50);
        assert_eq!(u32::from_le_bytes([buf[80], buf[81], buf[82], buf[83]]), 1);
        // 法向 +z.
        let nz = f32::from_le_bytes([buf[92], buf[93], buf[94], buf[95]]);
        assert_eq!(nz, 1.0);
        // 第二个顶点的 x.
        let x1 = f32::from_le_bytes([buf[108], buf[109], buf[110], buf[111]]);
        assert_eq!(x1, 1.0);
    }

    #[test]
    fn test_stl_ascii() {
        let text = String::from_utf8(encode(&triangle(), MeshFormat::StlAscii)).unwrap();
        assert!(text.starts_with("solid"));
        assert_eq!(text.matches("vertex").count(), 3);
        assert!(text.contains("facet normal 0.000000e0 0.000000e0 1.000000e0"));
        assert!(text.trim_end().ends_with("endsolid vessel"));
    }

    #[test]
    fn test_obj_is_one_based() {
        let text = String::from_utf8(encode(&triangle(), MeshFormat::Obj)).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 3);
        assert!(text.lines().any(|l| l == "f 1 2 3"));
    }

    #[test]
    fn test_ply_header() {
        let text = String::from_utf8(encode(&triangle(), MeshFormat::Ply)).unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        assert_eq!(lines[0], "ply");
        assert!(lines.contains(&"format ascii 1.0"));
        assert!(lines.contains(&"element vertex 3"));
        assert!(lines.contains(&"property double x"));
        assert!(lines.contains(&"element face 1"));
        assert!(lines.contains(&"3 0 1 2"));
    }

    #[test]
    fn test_ply_reads_back() {
        use ply_rs::parser::Parser;
        use ply_rs::ply::{DefaultElement, Property};

        let buf = encode(&triangle(), MeshFormat::Ply);
        let ply = Parser::<DefaultElement>::new().read_ply(&mut &buf[..]).unwrap();
        assert_eq!(ply.payload["vertex"].len(), 3);
        assert_eq!(ply.payload["vertex"][1]["x"], Property::Double(1.0));
        assert_eq!(
            ply.payload["face"][0]["vertex_indices"],
            Property::ListUInt(vec![0, 1, 2])
        );
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.stl");
        triangle().save(&path, MeshFormat::Stl).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 134);

        let bad = dir.path().join("missing").join("t.stl");
        assert!(triangle().save(bad, MeshFormat::Obj).is_err());
    }
}
