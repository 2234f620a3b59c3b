use anyhow::{anyhow, Context, Result};
use hourglass::{PixelSurface, Surface, Vec2, Visual};
use sdl2::{
    event::Event, keyboard::Keycode, pixels::Color, pixels::PixelFormatEnum, render::BlendMode,
    render::Canvas, render::Texture, render::TextureCreator, video::Window, video::WindowContext,
    EventPump,
};

const BACKGROUND_COLOR: Color = Color::RGB(9, 9, 11);

fn get_sdl_window(sdl_context: &sdl2::Sdl, title: &str, size: Vec2<u32>) -> Result<Window> {
    let video_subsystem = sdl_context.video().map_err(|e| anyhow!(e))?;
    video_subsystem
        .window(title, size.x, size.y)
        .position_centered()
        .build()
        .context("could not open window")
}

pub struct App {
    running: bool,
    visual: Visual,
    surface: PixelSurface,
    canvas: Canvas<Window>,
    event_pump: EventPump,
}

impl App {
    /// Opens a window `zoom` times the size of the drawing surface. Frames are
    /// paced by vsync.
    pub fn new(visual: Visual, surface: PixelSurface, zoom: u32) -> Result<Self> {
        let sdl_context = sdl2::init().map_err(|e| anyhow!(e))?;
        let size = surface.size();
        let window = get_sdl_window(
            &sdl_context,
            "hourglass",
            Vec2::new(size.x * zoom.max(1), size.y * zoom.max(1)),
        )?;
        let canvas = window
            .into_canvas()
            .present_vsync()
            .build()
            .context("could not create canvas")?;

        Ok(App {
            running: true,
            visual,
            surface,
            event_pump: sdl_context.event_pump().map_err(|e| anyhow!(e))?,
            canvas,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn input(&mut self) {
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => self.running = false,
                Event::KeyDown {
                    keycode: Some(Keycode::R),
                    ..
                } => self.visual.reseed(),
                _ => {}
            }
        }
    }

    pub fn update(&mut self) {
        self.visual.frame(&mut self.surface);
    }

    pub fn texture_creator(&self) -> TextureCreator<WindowContext> {
        self.canvas.texture_creator()
    }

    /// Streaming texture matching the surface, reused by every `render`.
    pub fn frame_texture<'a>(&self, creator: &'a TextureCreator<WindowContext>) -> Result<Texture<'a>> {
        let size = self.surface.size();
        // ABGR8888 is R, G, B, A in memory on little-endian hosts
        let mut texture = creator
            .create_texture_streaming(PixelFormatEnum::ABGR8888, size.x, size.y)
            .context("could not create texture")?;
        texture.set_blend_mode(BlendMode::Blend);
        Ok(texture)
    }

    pub fn render(&mut self, texture: &mut Texture) -> Result<()> {
        let width = self.surface.size().x;
        texture
            .update(None, self.surface.as_bytes(), width as usize * 4)
            .context("could not upload frame")?;

        self.canvas.set_draw_color(BACKGROUND_COLOR);
        self.canvas.clear();
        self.canvas.copy(texture, None, None).map_err(|e| anyhow!(e))?;
        self.canvas.present();
        Ok(())
    }

    pub fn shutdown(mut self) {
        self.visual.dispose();
    }
}
