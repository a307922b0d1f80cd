//! Grid transfer compute shaders.
//!
//! One thread per output node. Restriction takes the weighted average of
//! the nine fine neighbours of a coarse node (axis weights ½, 1, ½,
//! normalised over the neighbours inside the grid); prolongation
//! interpolates bilinearly. Both match the host kernels of
//! `lattix_solver::transfer` up to f32 rounding.

use crate::context::WgpuContext;
use crate::error::{Result, WgpuError};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 256;

/// Which way a transfer goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    /// Fine to coarse.
    Restrict,
    /// Coarse to fine.
    Prolongate,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    wf: u32,
    wc: u32,
    n: u32,
    /// Threads per row of the dispatch grid.
    stride: u32,
}

/// Compiled restriction and prolongation pipelines.
pub struct TransferKernels {
    ctx: Arc<WgpuContext>,
    restrict: wgpu::ComputePipeline,
    prolongate: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl TransferKernels {
    pub fn new(ctx: Arc<WgpuContext>) -> Result<Self> {
        let device = ctx.device();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Transfer Shader"),
            source: wgpu::ShaderSource::Wgsl(TRANSFER_SHADER.into()),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Grid Transfer Bind Group Layout"),
            entries: &[
                // Grid sizes
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grid Transfer Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label, entry_point| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let restrict = pipeline("Restriction Pipeline", "restrict_grid");
        let prolongate = pipeline("Prolongation Pipeline", "prolongate_grid");

        Ok(Self {
            ctx,
            restrict,
            prolongate,
            bind_group_layout,
        })
    }

    /// Run `op` from `src` into `dst` for a `wf × wf` / `wc × wc` grid pair
    /// and wait for completion.
    pub fn dispatch(
        &self,
        op: TransferOp,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        wf: usize,
        wc: usize,
    ) -> Result<()> {
        let n = match op {
            TransferOp::Restrict => wc * wc,
            TransferOp::Prolongate => wf * wf,
        };
        let needed = (n * std::mem::size_of::<f32>()) as u64;
        if dst.size() < needed {
            return Err(WgpuError::Buffer(format!(
                "output buffer of {} bytes cannot hold {} nodes",
                dst.size(),
                n
            )));
        }

        let groups = (n as u32).div_ceil(WORKGROUP_SIZE);
        let max_x = self.ctx.max_workgroups_per_dimension();
        let groups_x = groups.min(max_x);
        let groups_y = groups.div_ceil(groups_x);
        if groups_y > max_x {
            return Err(WgpuError::Compute(format!(
                "{} nodes exceed the dispatch limit",
                n
            )));
        }

        let params = Params {
            wf: wf as u32,
            wc: wc as u32,
            n: n as u32,
            stride: groups_x * WORKGROUP_SIZE,
        };
        let device = self.ctx.device();
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Transfer Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Grid Transfer Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: src.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: dst.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Grid Transfer Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Grid Transfer Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(match op {
                TransferOp::Restrict => &self.restrict,
                TransferOp::Prolongate => &self.prolongate,
            });
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        self.ctx.queue().submit(std::iter::once(encoder.finish()));
        device.poll(wgpu::Maintain::Wait);
        Ok(())
    }
}

/// WGSL source of both transfer kernels.
const TRANSFER_SHADER: &str = r#"
struct Params {
    wf: u32,
    wc: u32,
    n: u32,
    stride: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> src: array<f32>;
@group(0) @binding(2) var<storage, read_write> dst: array<f32>;

fn axis_weight(d: i32) -> f32 {
    if (d == 0) {
        return 1.0;
    }
    return 0.5;
}

@compute @workgroup_size(256)
fn restrict_grid(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x + gid.y * params.stride;
    if (i >= params.n) {
        return;
    }
    let wf = i32(params.wf);
    let fx = 2 * i32(i % params.wc);
    let fy = 2 * i32(i / params.wc);
    var acc = 0.0;
    var weight = 0.0;
    for (var dy = -1; dy <= 1; dy++) {
        let y = fy + dy;
        if (y < 0 || y >= wf) {
            continue;
        }
        for (var dx = -1; dx <= 1; dx++) {
            let x = fx + dx;
            if (x < 0 || x >= wf) {
                continue;
            }
            let w = axis_weight(dx) * axis_weight(dy);
            acc += w * src[u32(y * wf + x)];
            weight += w;
        }
    }
    dst[i] = acc / weight;
}

@compute @workgroup_size(256)
fn prolongate_grid(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x + gid.y * params.stride;
    if (i >= params.n) {
        return;
    }
    let wc = params.wc;
    let fx = i % params.wf;
    let fy = i / params.wf;
    let x0 = fx / 2u;
    let y0 = fy / 2u;
    let x1 = x0 + fx % 2u;
    let y1 = y0 + fy % 2u;
    dst[i] = 0.25 * (src[y0 * wc + x0] + src[y0 * wc + x1] + src[y1 * wc + x0] + src[y1 * wc + x1]);
}
"#;
