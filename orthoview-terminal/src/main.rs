//! OrthoView Terminal - orthographic STL viewer
//!
//! Usage: orthoview-terminal [path/to/file.stl]
//!
//! Without a path a cube is shown.
//! Controls:
//!   - WASD / Arrow Keys: Rotate the model
//!   - E/R: Roll rotation
//!   - V: Next preset view
//!   - O: Toggle outlines
//!   - Q/ESC: Quit
use std::env;
use std::fs;
use std::io;

use orthoview_core::{stl, TriangleMesh};
use orthoview_terminal::{to_io_error, TerminalApp};

fn main() -> io::Result<()> {
    let mesh = match env::args().nth(1) {
        Some(path) => {
            println!("Loading STL file: {}", path);
            let data = fs::read(&path)
                .map_err(|e| io::Error::new(e.kind(), format!("Failed to read STL file {}: {}", path, e)))?;
            let mesh = stl::parse_stl(&data).map_err(to_io_error)?;
            println!("Loaded {} triangles", mesh.triangle_count());
            if !mesh.is_manifold() {
                println!(
                    "Warning: {} edges have no matching neighbour",
                    mesh.non_manifold_edges().len()
                );
            }
            mesh
        }
        None => TriangleMesh::cube(2.0),
    };

    println!("Starting terminal viewer (press Q to quit)...");
    std::thread::sleep(std::time::Duration::from_secs(1));

    let mut app = TerminalApp::new(mesh)?;
    app.run()
}
