use log::{error, info};
use std::fmt;
use thiserror::Error;
use wgpu::Device;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader fault: {log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("program link fault: {log}")]
    Link { log: String },
}

/// Lifecycle of a vertex/fragment program pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgramState {
    #[default]
    Uncompiled,
    Compiling,
    Linked,
    Active,
    Fault,
}

/// Fixed pipeline shape a [`Program`] is linked against.
pub struct PipelineConfig<'a> {
    pub layout: &'a wgpu::PipelineLayout,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub target_format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

/// A compiled and linked program with stable identity.
///
/// Rebuilding with new sources swaps the pipeline inside the same value,
/// so a handle the host caches stays valid across shader edits. A failed
/// rebuild parks the program in [`ProgramState::Fault`] but keeps the
/// previously linked pipeline, so rendering continues with the last good
/// sources.
pub struct Program {
    label: &'static str,
    pipeline: Option<wgpu::RenderPipeline>,
    state: ProgramState,
    last_log: Option<String>,
}

impl Program {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            pipeline: None,
            state: ProgramState::Uncompiled,
            last_log: None,
        }
    }

    /// Compile both stages and link them into a render pipeline.
    ///
    /// # Errors
    ///
    /// Compile failures report the offending stage with the captured
    /// driver log; link (pipeline validation) failures report the
    /// validation log. Neither mutates the previously linked pipeline.
    pub async fn compile_and_link(
        &mut self,
        device: &Device,
        vertex_source: &str,
        fragment_source: &str,
        config: &PipelineConfig<'_>,
    ) -> Result<(), ShaderError> {
        self.state = ProgramState::Compiling;

        let vertex = self
            .compile_stage(device, ShaderStage::Vertex, vertex_source)
            .await?;
        let fragment = self
            .compile_stage(device, ShaderStage::Fragment, fragment_source)
            .await?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(config.layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: config.vertex_buffers,
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Both faces are drawn so the box still seeds rays when
                // the camera sits inside the volume.
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.target_format,
                    blend: config.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        if let Some(link_error) = device.pop_error_scope().await {
            let log = link_error.to_string();
            error!("---{} program link fault---\n{log}", self.label);
            self.state = ProgramState::Fault;
            self.last_log = Some(log.clone());
            return Err(ShaderError::Link { log });
        }

        // Hot swap: the old pipeline is dropped only after the new one
        // linked, and the Program identity the host holds is unchanged.
        self.pipeline = Some(pipeline);
        self.state = ProgramState::Linked;
        self.last_log = None;
        info!("{} program linked", self.label);
        Ok(())
    }

    async fn compile_stage(
        &mut self,
        device: &Device,
        stage: ShaderStage,
        source: &str,
    ) -> Result<wgpu::ShaderModule, ShaderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let compile_error = device.pop_error_scope().await;

        if let Some(compile_error) = compile_error {
            let info = module.get_compilation_info().await;
            let mut log = String::new();
            for message in &info.messages {
                if message.message_type == wgpu::CompilationMessageType::Error {
                    log.push_str(&message.message);
                    log.push('\n');
                }
            }
            if log.is_empty() {
                log = compile_error.to_string();
            }
            error!("---{stage} shader fault---\n{log}");
            self.state = ProgramState::Fault;
            self.last_log = Some(log.clone());
            return Err(ShaderError::Compile { stage, log });
        }

        Ok(module)
    }

    /// The linked pipeline, if any. Present even in `Fault` when an
    /// earlier link succeeded.
    pub fn pipeline(&self) -> Option<&wgpu::RenderPipeline> {
        self.pipeline.as_ref()
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// Diagnostic log of the most recent fault.
    pub fn last_log(&self) -> Option<&str> {
        self.last_log.as_deref()
    }

    /// Mark the program as bound for rendering.
    pub(crate) fn mark_active(&mut self) {
        if self.state == ProgramState::Linked {
            self.state = ProgramState::Active;
        }
    }

    /// Drop the pipeline and return to `Uncompiled`. Idempotent.
    pub fn release(&mut self) {
        self.pipeline = None;
        self.state = ProgramState::Uncompiled;
        self.last_log = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_program_is_uncompiled() {
        let program = Program::new("test");
        assert_eq!(program.state(), ProgramState::Uncompiled);
        assert!(program.pipeline().is_none());
        assert!(program.last_log().is_none());
    }

    #[test]
    fn release_is_idempotent() {
        let mut program = Program::new("test");
        program.release();
        program.release();
        assert_eq!(program.state(), ProgramState::Uncompiled);
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }
}
