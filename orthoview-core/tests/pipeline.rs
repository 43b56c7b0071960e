use approx::assert_relative_eq;
use nalgebra::Point3;
use orthoview_core::{
    diagnostics, extract_outline, parse_stl, render, CameraSet, ImageSize, OrthoCamera, OrthoError, TriangleMesh,
    ViewConfig,
};

fn cube_triangles(mesh: &TriangleMesh) -> Vec<[Point3<f64>; 3]> {
    (0..mesh.triangle_count()).map(|t| mesh.triangle_positions(t)).collect()
}

fn binary_stl(triangles: &[[Point3<f64>; 3]]) -> Vec<u8> {
    let mut data = vec![0u8; 80];
    data.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for triangle in triangles {
        data.extend_from_slice(&[0u8; 12]);
        for vertex in triangle {
            for c in [vertex.x, vertex.y, vertex.z] {
                data.extend_from_slice(&(c as f32).to_le_bytes());
            }
        }
        data.extend_from_slice(&[0u8; 2]);
    }
    data
}

fn ascii_stl(triangles: &[[Point3<f64>; 3]]) -> String {
    let mut text = String::from("solid fixture\n");
    for triangle in triangles {
        text.push_str("  facet normal 0 0 0\n    outer loop\n");
        for v in triangle {
            text.push_str(&format!("      vertex {} {} {}\n", v.x, v.y, v.z));
        }
        text.push_str("    endloop\n  endfacet\n");
    }
    text.push_str("endsolid fixture\n");
    text
}

fn covered(output: &orthoview_core::RenderOutput) -> usize {
    output.triangle_buffer().iter().filter(|&&t| t >= 0).count()
}

#[test]
fn test_binary_cube_is_closed() {
    let triangles = cube_triangles(&TriangleMesh::cube(1.0));
    let mesh = parse_stl(&binary_stl(&triangles)).unwrap();

    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.edge_count(), 36);
    assert!(mesh.is_manifold());
    assert!(mesh.edges().all(|edge| edge.right.is_some()));
}

#[test]
fn test_single_triangle_reports_three_open_edges() {
    let triangle = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let mesh = parse_stl(&binary_stl(&[triangle])).unwrap();
    assert_eq!(mesh.non_manifold_edges().len(), 3);
    assert!(mesh.edges().all(|edge| edge.right.is_none()));
}

#[test]
fn test_ascii_and_binary_agree() {
    let triangles = cube_triangles(&TriangleMesh::cube(2.0));
    let binary = parse_stl(&binary_stl(&triangles)).unwrap();
    let ascii = parse_stl(ascii_stl(&triangles).as_bytes()).unwrap();

    assert_eq!(ascii.triangle_count(), binary.triangle_count());
    assert_eq!(ascii.vertex_count(), binary.vertex_count());
    for t in 0..ascii.triangle_count() {
        assert_eq!(ascii.triangle_positions(t), binary.triangle_positions(t));
        assert_relative_eq!(ascii.normal(t), binary.normal(t));
    }
    assert!(ascii.is_manifold());
}

#[test]
fn test_unit_cube_fills_top_view() {
    let mesh = parse_stl(&binary_stl(&cube_triangles(&TriangleMesh::cube(1.0)))).unwrap();
    let camera = OrthoCamera::TOP;
    let view = ViewConfig::default().with_size(100, 100).with_padding(0.0);
    let scale = view.fit(&camera, &mesh.bounds()).unwrap();
    assert_relative_eq!(scale.scale, 100.0);

    let output = render(&mesh, &camera, &scale, view.size).unwrap();
    assert_eq!(covered(&output), 100 * 100);
    assert!(output.depth_buffer().iter().all(|&d| d == 0.5));

    let corner = output.world_at(&camera, &scale, 0, 0).unwrap();
    assert_relative_eq!(corner, Point3::new(-0.5, 0.5, 0.5), epsilon = 1e-12);
}

#[test]
fn test_isometric_outline_over_render() {
    let mesh = TriangleMesh::cube(4.0);
    let camera = OrthoCamera::isometric_front_overhead();
    let view = ViewConfig::default().with_size(80, 60);
    let scale = view.fit(&camera, &mesh.bounds()).unwrap();
    let output = render(&mesh, &camera, &scale, view.size).unwrap();
    let outline = extract_outline(&mesh, &output, &camera, &scale);

    // Three faces are visible from above and in front
    let mut owners: Vec<usize> = (0..60)
        .flat_map(|y| (0..80).map(move |x| (x, y)))
        .filter_map(|(x, y)| output.triangle_at(x, y))
        .map(|t| t / 2)
        .collect();
    owners.sort_unstable();
    owners.dedup();
    assert_eq!(owners.len(), 3);

    let opaque: Vec<[u8; 4]> = outline
        .as_bytes()
        .chunks_exact(4)
        .filter(|px| px[3] != 0)
        .map(|px| [px[0], px[1], px[2], px[3]])
        .collect();
    assert!(opaque.len() > 100);
    assert!(opaque.iter().all(|&px| px == [0, 0, 0, 255]));

    let mut pixels = output.pixels().clone();
    pixels.composite(&outline);
    for y in 0..60 {
        for x in 0..80 {
            if outline.pixel(x, y)[3] != 0 {
                assert_eq!(pixels.pixel(x, y), [0, 0, 0, 255]);
            } else {
                assert_eq!(pixels.pixel(x, y), output.pixels().pixel(x, y));
            }
        }
    }
}

#[test]
fn test_standard_views_share_scale_and_render_in_parallel() {
    let mesh = TriangleMesh::from_triangles(&cube_triangles(&TriangleMesh::cube(1.0)));
    let bounds = mesh.bounds().padded(0.5);
    let cameras = CameraSet::standard();
    let view = ViewConfig::default().with_size(64, 32);
    let scales = view.fit_all(&cameras, &bounds).unwrap();
    assert!(scales.iter().all(|s| s.scale == scales.top.scale));

    let mesh = &mesh;
    let outputs = std::thread::scope(|scope| {
        let handles: Vec<_> = [(cameras.top, scales.top), (cameras.front, scales.front), (cameras.right, scales.right)]
            .into_iter()
            .map(|(camera, scale)| scope.spawn(move || render(mesh, &camera, &scale, view.size)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect::<Vec<_>>()
    });
    let counts: Vec<usize> = outputs.iter().map(covered).collect();
    assert!(counts[0] > 0);
    assert!(counts.iter().all(|&c| c == counts[0]));

    let depth = diagnostics::depth_image(&outputs[1]);
    assert_eq!(depth.size(), ImageSize::new(64, 32));
}

#[test]
fn test_configuration_errors() {
    let mesh = TriangleMesh::cube(1.0);
    let camera = OrthoCamera::FRONT;
    assert_eq!(
        ViewConfig::default().with_padding(0.5).fit(&camera, &mesh.bounds()),
        Err(OrthoError::InvalidPadding(0.5))
    );

    let flat = TriangleMesh::from_triangles(&[[
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ]]);
    // No extent along film x, the film y axis still fits
    assert!(ViewConfig::default().fit(&camera, &flat.bounds()).is_ok());

    let point = TriangleMesh::from_triangles(&[[Point3::origin(); 3]]);
    assert_eq!(
        ViewConfig::default().fit(&camera, &point.bounds()),
        Err(OrthoError::DegenerateBounds)
    );

    let err = parse_stl(&[0u8; 40]).unwrap_err();
    assert!(err.is_parse_error());
}
