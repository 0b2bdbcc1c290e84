use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use wgpu::util::DeviceExt;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::canvas::{Canvas, SpriteSheet, Viewport};
use crate::simulation::Simulation;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Edge length of a body marker on screen.
const QUAD_PIXELS: f32 = 6.0;

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

/// Collects one coloured quad per picture for the next frame.
pub struct QuadBatch {
    viewport: Viewport,
    colors: HashMap<String, [f32; 3]>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl QuadBatch {
    pub fn new(viewport: Viewport, sprites: &SpriteSheet, names: &[&str]) -> QuadBatch {
        let colors = names
            .iter()
            .filter_map(|name| sprites.get(name).map(|s| (name.to_string(), s.mean_color())))
            .collect();
        QuadBatch {
            viewport,
            colors,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl Canvas for QuadBatch {
    fn picture(&mut self, x: f64, y: f64, name: &str) {
        let [cx, cy] = self.viewport.to_clip(x, y);
        if !cx.is_finite() || !cy.is_finite() {
            return;
        }
        let color = self.colors.get(name).copied().unwrap_or(WHITE);
        let hw = QUAD_PIXELS / self.viewport.width.max(1) as f32;
        let hh = QUAD_PIXELS / self.viewport.height.max(1) as f32;

        let base = self.vertices.len() as u32;
        // Counter-clockwise from the bottom left corner.
        for (dx, dy) in [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)] {
            self.vertices.push(Vertex {
                position: [cx + dx, cy + dy, 0.0],
                color,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    render_pipeline: wgpu::RenderPipeline,
}

impl Gpu {
    fn new(window: Arc<Window>) -> anyhow::Result<Gpu> {
        let wgpu_instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            dx12_shader_compiler: wgpu::Dx12Compiler::Fxc,
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        });

        for adapter in wgpu_instance.enumerate_adapters(wgpu::Backends::PRIMARY) {
            log::debug!("available GPU: {:?}", adapter.get_info());
        }

        let size = window.inner_size();
        let surface = wgpu_instance
            .create_surface(window)
            .context("failed to create surface")?;

        let adapter =
            pollster::block_on(wgpu_instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            }))
            .ok_or_else(|| anyhow!("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("nbody device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .context("failed to request device")?;

        log::info!("selected GPU: {:?}", adapter.get_info());

        let surface_capabilities = surface.get_capabilities(&adapter);
        let surface_format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[Vertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        Ok(Gpu {
            surface,
            device,
            queue,
            config,
            render_pipeline,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn render(&mut self, batch: &QuadBatch) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let buffers = if batch.indices().is_empty() {
            None
        } else {
            let vertex_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Vertex buffer"),
                    contents: bytemuck::cast_slice(batch.vertices()),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let index_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Index Buffer"),
                    contents: bytemuck::cast_slice(batch.indices()),
                    usage: wgpu::BufferUsages::INDEX,
                });
            Some((vertex_buffer, index_buffer))
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some((vertex_buffer, index_buffer)) = &buffers {
                render_pass.set_pipeline(&self.render_pipeline);
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..batch.indices().len() as u32, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

pub struct ViewerOptions {
    pub total_time: f64,
    pub delta_time: f64,
    pub steps_per_frame: u32,
    pub size: u32,
}

struct ViewerApp {
    simulation: Simulation,
    options: ViewerOptions,
    batch: QuadBatch,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(simulation: Simulation, options: ViewerOptions, batch: QuadBatch) -> ViewerApp {
        ViewerApp {
            simulation,
            options,
            batch,
            window: None,
            gpu: None,
            error: None,
        }
    }

    /// Records the first fatal error and stops the event loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn finish(self) -> anyhow::Result<Simulation> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.simulation),
        }
    }

    fn advance(&mut self) -> bool {
        for _ in 0..self.options.steps_per_frame {
            if self.simulation.elapsed >= self.options.total_time {
                return false;
            }
            self.simulation.step(self.options.delta_time);
        }
        true
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("N-Body")
            .with_inner_size(winit::dpi::PhysicalSize::new(self.options.size, self.options.size));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("failed to create window"));
                return;
            }
        };

        match Gpu::new(window.clone()) {
            Ok(gpu) => {
                let size = window.inner_size();
                self.batch.resize(size.width, size.height);
                self.gpu = Some(gpu);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed at t = {:e}", self.simulation.elapsed);
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("window resized to {:?}", new_size);
                self.batch.resize(new_size.width, new_size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size);
                }
            }
            WindowEvent::RedrawRequested => {
                if !self.advance() {
                    log::info!("reached t = {:e}", self.simulation.elapsed);
                    event_loop.exit();
                    return;
                }

                self.batch.clear();
                self.simulation.draw(&mut self.batch);

                let Some(gpu) = self.gpu.as_mut() else {
                    return;
                };
                match gpu.render(&self.batch) {
                    Ok(_) => {}
                    // Reconfigure the surface if lost
                    Err(wgpu::SurfaceError::Lost) => {
                        let size =
                            winit::dpi::PhysicalSize::new(gpu.config.width, gpu.config.height);
                        gpu.resize(size);
                    }
                    // The system is out of memory, we should probably quit
                    Err(e @ wgpu::SurfaceError::OutOfMemory) => {
                        self.fail(event_loop, anyhow::Error::new(e).context("render failed"))
                    }
                    // All other errors (Outdated, Timeout) should be resolved by the next frame
                    Err(e) => log::warn!("{:?}", e),
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

/// Opens a window and animates `simulation` until it is closed or
/// `total_time` is reached. Returns the simulation in its final state.
pub fn run_viewer(
    simulation: Simulation,
    sprites: &SpriteSheet,
    options: ViewerOptions,
) -> anyhow::Result<Simulation> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;

    // ControlFlow::Poll continuously runs the event loop, even if the OS hasn't
    // dispatched any events.
    event_loop.set_control_flow(ControlFlow::Poll);

    let names: Vec<&str> = simulation.bodies.iter().map(|b| b.name()).collect();
    let viewport = Viewport::new(simulation.radius, options.size, options.size);
    let batch = QuadBatch::new(viewport, sprites, &names);

    let mut app = ViewerApp::new(simulation, options, batch);

    event_loop.run_app(&mut app).context("event loop failed")?;
    app.finish()
}
