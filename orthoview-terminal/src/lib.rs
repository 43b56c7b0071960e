//! Terminal viewer for orthographic STL renders
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use orthoview_core::{
    extract_outline_with, render, OrthoCamera, OrthoError, OutlineConfig, RotationState, Transform, TriangleMesh,
    ViewConfig,
};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use tracing::debug;

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Rotation applied per key press (radians)
const ROTATION_STEP: f64 = 0.1;

/// Views cycled with `V`, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPreset {
    Isometric,
    Top,
    Front,
    Right,
    Back,
    Left,
    Bottom,
}

impl ViewPreset {
    const ALL: [Self; 7] = [
        Self::Isometric,
        Self::Top,
        Self::Front,
        Self::Right,
        Self::Back,
        Self::Left,
        Self::Bottom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Isometric => "isometric",
            Self::Top => "top",
            Self::Front => "front",
            Self::Right => "right",
            Self::Back => "back",
            Self::Left => "left",
            Self::Bottom => "bottom",
        }
    }

    pub fn camera(self) -> OrthoCamera {
        match self {
            Self::Isometric => OrthoCamera::isometric_front_overhead(),
            Self::Top => OrthoCamera::TOP,
            Self::Front => OrthoCamera::FRONT,
            Self::Right => OrthoCamera::RIGHT,
            Self::Back => OrthoCamera::BACK,
            Self::Left => OrthoCamera::LEFT,
            Self::Bottom => OrthoCamera::BOTTOM,
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

/// Map core errors onto I/O errors for the binary.
pub fn to_io_error(err: OrthoError) -> io::Error {
    let kind = if err.is_parse_error() {
        io::ErrorKind::InvalidData
    } else {
        io::ErrorKind::InvalidInput
    };
    io::Error::new(kind, err)
}

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    mesh: TriangleMesh,
    rotation: RotationState,
    preset: ViewPreset,
    show_outline: bool,
    view: ViewConfig,
    outline: OutlineConfig,
    renderer: AsciiRenderer,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// Viewer sized to the current terminal, leaving one row for the status line.
    pub fn new(mesh: TriangleMesh) -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        Ok(Self::with_size(mesh, cols as usize, rows.saturating_sub(1).max(1) as usize))
    }

    pub fn with_size(mesh: TriangleMesh, cols: usize, rows: usize) -> Self {
        let renderer = AsciiRenderer::new(cols, rows);
        Self {
            mesh,
            rotation: RotationState::zero(),
            preset: ViewPreset::Isometric,
            show_outline: true,
            view: ViewConfig::default()
                .with_size(renderer.image_size().width, renderer.image_size().height)
                .with_padding(0.05),
            outline: OutlineConfig::default(),
            renderer,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            if event::poll(Duration::from_millis(0))? {
                self.handle_input()?;
            }

            self.draw()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        if let Event::Key(KeyEvent {
            code,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        {
            self.handle_key(code);
        }
        Ok(())
    }

    /// Apply one key press to the view state.
    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('w') | KeyCode::Up => self.rotation.rotate(ROTATION_STEP, 0.0, 0.0),
            KeyCode::Char('s') | KeyCode::Down => self.rotation.rotate(-ROTATION_STEP, 0.0, 0.0),
            KeyCode::Char('a') | KeyCode::Left => self.rotation.rotate(0.0, -ROTATION_STEP, 0.0),
            KeyCode::Char('d') | KeyCode::Right => self.rotation.rotate(0.0, ROTATION_STEP, 0.0),
            KeyCode::Char('e') => self.rotation.rotate(0.0, 0.0, ROTATION_STEP),
            KeyCode::Char('r') => self.rotation.rotate(0.0, 0.0, -ROTATION_STEP),
            KeyCode::Char('v') => {
                self.preset = self.preset.next();
                self.rotation = RotationState::zero();
                debug!(view = self.preset.name(), "switched view");
            }
            KeyCode::Char('o') => self.show_outline = !self.show_outline,
            _ => {}
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn preset(&self) -> ViewPreset {
        self.preset
    }

    /// Current camera: the selected preset turned by the accumulated rotation.
    pub fn camera(&self) -> OrthoCamera {
        Transform::orient(&self.preset.camera(), &self.rotation)
    }

    pub fn renderer(&self) -> &AsciiRenderer {
        &self.renderer
    }

    /// Run the core pipeline for the current view into the character buffer.
    pub fn compose_frame(&mut self) -> io::Result<()> {
        let camera = self.camera();
        let scale = self.view.fit(&camera, &self.mesh.bounds()).map_err(to_io_error)?;
        let output = render(&self.mesh, &camera, &scale, self.view.size).map_err(to_io_error)?;
        let outline = self
            .show_outline
            .then(|| extract_outline_with(&self.mesh, &output, &camera, &scale, &self.outline));
        self.renderer.compose(output.pixels(), outline.as_ref());
        Ok(())
    }

    fn draw(&mut self) -> io::Result<()> {
        self.compose_frame()?;

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        // Status line below the image
        queue!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "OrthoView | {} | FPS: {:.1} | WASD/Arrows=Rotate E/R=Roll V=View O=Outline Q=Quit",
                self.preset.name(),
                self.fps
            )),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_update_state() {
        let mut app = TerminalApp::with_size(TriangleMesh::cube(1.0), 20, 10);
        assert_eq!(app.preset(), ViewPreset::Isometric);

        app.handle_key(KeyCode::Char('w'));
        app.handle_key(KeyCode::Left);
        assert!((app.rotation.x - ROTATION_STEP).abs() < 1e-12);
        assert!((app.rotation.y + ROTATION_STEP).abs() < 1e-12);

        app.handle_key(KeyCode::Char('v'));
        assert_eq!(app.preset(), ViewPreset::Top);
        assert_eq!(app.rotation, RotationState::zero());
        assert_eq!(app.camera(), OrthoCamera::TOP);

        for _ in 1..ViewPreset::ALL.len() {
            app.handle_key(KeyCode::Char('v'));
        }
        assert_eq!(app.preset(), ViewPreset::Isometric);

        assert!(app.is_running());
        app.handle_key(KeyCode::Esc);
        assert!(!app.is_running());
    }

    #[test]
    fn test_frame_shows_cube_and_outline() {
        let mut app = TerminalApp::with_size(TriangleMesh::cube(1.0), 40, 20);
        app.handle_key(KeyCode::Char('v'));
        app.compose_frame().unwrap();
        let middle = app.renderer().line(10);
        assert!(middle.contains('#'));
        assert!(middle.trim().len() > 10);

        app.handle_key(KeyCode::Char('o'));
        app.compose_frame().unwrap();
        assert!(!app.renderer().line(10).contains('#'));
    }

    #[test]
    fn test_core_errors_map_to_io_kinds() {
        let err = to_io_error(OrthoError::malformed(3, "bad vertex"));
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let err = to_io_error(OrthoError::DegenerateBounds);
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
