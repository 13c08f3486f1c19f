// This file is part of the open-source port of facelbp engine, which implements face detection
// using the Multi-scale Block Local Binary Pattern (MB-LBP) cascade algorithm.
//
// Copyright (C) 2013, Keith Mok <ek9852@gmail.com>
//
// As an open-source face detection engine: you can redistribute facelbp source codes
// and/or modify it under the terms of the Apache License, Version 2.0.
//
// You should have received a copy of the Apache License, Version 2.0 along with the software.
// If not, see < https://www.apache.org/licenses/LICENSE-2.0>.

//! Cascade evaluation offloaded to a compute device through wgpu.

use std::mem;
use std::sync::mpsc;

use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::common::{IntegralImage, Rectangle};
use crate::detector::Task;
use crate::error::{Error, Result};
use crate::model::Model;

const WORKGROUP_SIZE: u32 = 64;
const STAGE_STRIDE: usize = 3;
const CLASSIFIER_STRIDE: usize = 11;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    width: u32,
    height: u32,
    num_tasks: u32,
    num_stages: u32,
    classifier_base: u32,
    rect_base: u32,
    pad: [u32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuTask {
    x: i32,
    y: i32,
    scale: i32,
}

impl From<&Task> for GpuTask {
    fn from(task: &Task) -> Self {
        GpuTask {
            x: task.x,
            y: task.y,
            scale: task.fixed_scale(),
        }
    }
}

/// Model flattened into a single word table.
struct ModelTable {
    words: Vec<u32>,
    num_stages: u32,
    classifier_base: u32,
    rect_base: u32,
}

impl ModelTable {
    fn new(model: &Model) -> Self {
        let num_stages = model.stages().len();
        let classifier_base = num_stages * STAGE_STRIDE;
        let rect_base = classifier_base + model.num_weak_classifiers() * CLASSIFIER_STRIDE;

        let mut words = Vec::with_capacity(rect_base + model.rects().len() * 4);
        let mut first = 0;
        for stage in model.stages() {
            words.push(stage.threshold().to_bits());
            words.push(stage.classifiers().len() as u32);
            words.push(first as u32);
            first += stage.classifiers().len();
        }
        for classifier in model.stages().iter().flat_map(|s| s.classifiers()) {
            words.push(classifier.rect_idx() as u32);
            words.extend_from_slice(classifier.lbp_map());
            words.push(classifier.pos().to_bits());
            words.push(classifier.neg().to_bits());
        }
        for rect in model.rects() {
            words.extend_from_slice(&[rect.x as u32, rect.y as u32, rect.w as u32, rect.h as u32]);
        }

        ModelTable {
            words,
            num_stages: num_stages as u32,
            classifier_base: classifier_base as u32,
            rect_base: rect_base as u32,
        }
    }
}

/// Device-resident cascade, full task list and frame buffers.
///
/// Every wgpu object is released on drop; fields are declared so that the
/// objects acquired last are dropped first.
pub struct GpuEvaluator {
    sub_bind_group: wgpu::BindGroup,
    full_bind_group: wgpu::BindGroup,
    staging: wgpu::Buffer,
    hits: wgpu::Buffer,
    image: wgpu::Buffer,
    sub_tasks: wgpu::Buffer,
    _full_tasks: wgpu::Buffer,
    params: wgpu::Buffer,
    _model: wgpu::Buffer,
    pipeline: wgpu::ComputePipeline,
    queue: wgpu::Queue,
    device: wgpu::Device,
    tasks: Vec<Task>,
    capacity: usize,
    max_groups: u32,
    table: ModelTable,
    width: u32,
    height: u32,
    feature_width: u32,
    feature_height: u32,
}

impl GpuEvaluator {
    /// Acquire a compute device and upload `model` and the full task list.
    pub fn new(model: &Model, tasks: &[Task], width: u32, height: u32) -> Result<Self> {
        pollster::block_on(Self::new_async(model, tasks, width, height))
    }

    async fn new_async(model: &Model, tasks: &[Task], width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::Gpu("no compute adapter found".into()))?;
        let adapter_info = adapter.get_info();
        info!(
            "Using GPU adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let table = ModelTable::new(model);
        let capacity = tasks.len().max(1);
        let limits = adapter.limits();
        check_binding_size(&limits, "model", table.words.len() * 4)?;
        check_binding_size(&limits, "task list", capacity * mem::size_of::<GpuTask>())?;
        check_binding_size(&limits, "integral image", width as usize * height as usize * 4)?;
        check_binding_size(&limits, "hit list", (capacity + 1) * 4)?;

        let max_groups = limits.max_compute_workgroups_per_dimension;
        let groups = (capacity as u64 + u64::from(WORKGROUP_SIZE) - 1) / u64::from(WORKGROUP_SIZE);
        if groups > u64::from(max_groups) * u64::from(max_groups) {
            return Err(Error::Gpu(format!(
                "{} tasks exceed the dispatch limit of the device",
                tasks.len()
            )));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lbpface device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lbp cascade"),
            source: wgpu::ShaderSource::Wgsl(include_str!("lbp.wgsl").into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("lbp cascade"),
            layout: None,
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("model table"),
            contents: bytemuck::cast_slice(&table.words),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scan params"),
            size: mem::size_of::<Params>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut gpu_tasks: Vec<GpuTask> = tasks.iter().map(GpuTask::from).collect();
        if gpu_tasks.is_empty() {
            gpu_tasks.push(GpuTask::from(&Task::new(0, 0, 1.0)));
        }
        let full_tasks = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("full tasks"),
            contents: bytemuck::cast_slice(&gpu_tasks),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let sub_tasks = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tracking tasks"),
            size: (capacity * mem::size_of::<GpuTask>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let image = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("integral image"),
            size: u64::from(width) * u64::from(height) * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let hits_size = ((capacity + 1) * 4) as u64;
        let hits = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hits"),
            size: hits_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hits readback"),
            size: hits_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = |label, task_buffer: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: model_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: task_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: image.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: hits.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: params.as_entire_binding(),
                    },
                ],
            })
        };
        let full_bind_group = bind_group("full scan", &full_tasks);
        let sub_bind_group = bind_group("tracking scan", &sub_tasks);

        if let Some(err) = device.pop_error_scope().await {
            return Err(Error::Gpu(err.to_string()));
        }

        debug!(
            "Uploaded {} model words and {} tasks to the device",
            table.words.len(),
            tasks.len()
        );

        Ok(GpuEvaluator {
            sub_bind_group,
            full_bind_group,
            staging,
            hits,
            image,
            sub_tasks,
            _full_tasks: full_tasks,
            params,
            _model: model_buffer,
            pipeline,
            queue,
            device,
            tasks: tasks.to_vec(),
            capacity,
            max_groups,
            table,
            width,
            height,
            feature_width: model.feature_width() as u32,
            feature_height: model.feature_height() as u32,
        })
    }

    /// Number of tasks one dispatch can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Evaluate the full task list, or `tasks` when given, against `integral`
    /// and append the windows that pass the cascade to `hits`.
    ///
    /// Hits are appended in task order.
    pub fn scan(
        &mut self,
        integral: &IntegralImage,
        tasks: Option<&[Task]>,
        hits: &mut Vec<Rectangle>,
    ) -> Result<()> {
        if integral.width() != self.width || integral.height() != self.height {
            return Err(Error::Transfer(format!(
                "integral image is {}x{}, device buffers are {}x{}",
                integral.width(),
                integral.height(),
                self.width,
                self.height
            )));
        }
        self.queue
            .write_buffer(&self.image, 0, bytemuck::cast_slice(integral.data()));

        match tasks {
            None => {
                let indices = self.dispatch(true, self.tasks.len())?;
                let (fw, fh) = (self.feature_width, self.feature_height);
                hits.extend(indices.iter().map(|&i| self.tasks[i].window(fw, fh)));
            }
            Some(tasks) => {
                for chunk in tasks.chunks(self.capacity) {
                    let gpu_tasks: Vec<GpuTask> = chunk.iter().map(GpuTask::from).collect();
                    self.queue
                        .write_buffer(&self.sub_tasks, 0, bytemuck::cast_slice(&gpu_tasks));
                    let indices = self.dispatch(false, chunk.len())?;
                    let (fw, fh) = (self.feature_width, self.feature_height);
                    hits.extend(indices.iter().map(|&i| chunk[i].window(fw, fh)));
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, full: bool, num_tasks: usize) -> Result<Vec<usize>> {
        if num_tasks == 0 {
            return Ok(Vec::new());
        }

        let params = Params {
            width: self.width,
            height: self.height,
            num_tasks: num_tasks as u32,
            num_stages: self.table.num_stages,
            classifier_base: self.table.classifier_base,
            rect_base: self.table.rect_base,
            pad: [0; 2],
        };
        self.queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
        self.queue
            .write_buffer(&self.hits, 0, bytemuck::bytes_of(&0u32));

        let groups = (num_tasks as u32 + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        let groups_x = groups.min(self.max_groups);
        let groups_y = (groups + groups_x - 1) / groups_x;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lbp scan"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("lbp scan"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            let bind_group = if full {
                &self.full_bind_group
            } else {
                &self.sub_bind_group
            };
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::Transfer(err.to_string()));
        }

        let count = self.read_words(0, 1)?[0] as usize;
        if count > num_tasks {
            return Err(Error::Transfer(format!(
                "device reported {} hits for {} tasks",
                count, num_tasks
            )));
        }

        let mut indices: Vec<usize> = self
            .read_words(4, count)?
            .into_iter()
            .map(|i| i as usize)
            .filter(|&i| i < num_tasks)
            .collect();
        // atomic appends land in any order
        indices.sort_unstable();
        Ok(indices)
    }

    fn read_words(&self, offset: u64, count: usize) -> Result<Vec<u32>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let size = (count * 4) as u64;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hits readback"),
            });
        encoder.copy_buffer_to_buffer(&self.hits, offset, &self.staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(..size);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| Error::Transfer(e.to_string()))?
            .map_err(|e| Error::Transfer(e.to_string()))?;

        let words = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&view).to_vec()
        };
        self.staging.unmap();
        Ok(words)
    }
}

fn check_binding_size(limits: &wgpu::Limits, what: &str, size: usize) -> Result<()> {
    if size as u64 > u64::from(limits.max_storage_buffer_binding_size) {
        return Err(Error::Gpu(format!(
            "{} needs {} bytes, device allows {}",
            what, size, limits.max_storage_buffer_binding_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ImageData;
    use crate::model::{LbpRect, Stage, WeakClassifier};

    fn model(threshold: f32) -> Model {
        let stages = vec![
            Stage::new(
                threshold,
                vec![
                    WeakClassifier::new(1, [0x0F; 8], 1.0, -1.0),
                    WeakClassifier::new(0, [0; 8], 0.5, -0.5),
                ],
            ),
            Stage::new(threshold, vec![WeakClassifier::new(0, [!0; 8], 2.0, 0.25)]),
        ];
        let rects = vec![
            LbpRect { x: 0, y: 0, w: 8, h: 8 },
            LbpRect { x: 2, y: 3, w: 4, h: 5 },
        ];
        Model::new(24, 24, stages, rects).unwrap()
    }

    #[test]
    fn test_model_table_layout() {
        let table = ModelTable::new(&model(0.5));
        assert_eq!(2, table.num_stages);
        assert_eq!(6, table.classifier_base);
        assert_eq!(6 + 3 * 11, table.rect_base);
        assert_eq!(table.rect_base as usize + 8, table.words.len());

        assert_eq!(vec![0.5f32.to_bits(), 2, 0, 0.5f32.to_bits(), 1, 2], table.words[..6]);
        let third = 6 + 2 * 11;
        assert_eq!(0, table.words[third]);
        assert_eq!(!0, table.words[third + 1]);
        assert_eq!(2.0f32.to_bits(), table.words[third + 9]);
        assert_eq!(0.25f32.to_bits(), table.words[third + 10]);
        assert_eq!(vec![2, 3, 4, 5], table.words[table.rect_base as usize + 4..]);
    }

    fn frame(width: u32, height: u32) -> IntegralImage {
        let pixels: Vec<u8> = (0..width * height).map(|i| (i * 7 % 256) as u8).collect();
        let mut integral = IntegralImage::new(width, height).unwrap();
        integral
            .compute(&ImageData::new(&pixels, width, height))
            .unwrap();
        integral
    }

    // Needs a compute adapter; skipped when none is present.
    #[test]
    fn test_gpu_scan_all_or_nothing() {
        let tasks: Vec<Task> = (0..100).map(|i| Task::new(i % 10, i / 10, 1.0)).collect();
        let integral = frame(64, 64);

        let mut accepting = match GpuEvaluator::new(&model(f32::MIN), &tasks, 64, 64) {
            Ok(gpu) => gpu,
            Err(e) => {
                println!("skipping GPU test: {}", e);
                return;
            }
        };
        let mut hits = Vec::new();
        accepting.scan(&integral, None, &mut hits).unwrap();
        let expected: Vec<Rectangle> = tasks.iter().map(|t| t.window(24, 24)).collect();
        assert_eq!(expected, hits);

        hits.clear();
        accepting
            .scan(&integral, Some(&tasks[10..20]), &mut hits)
            .unwrap();
        assert_eq!(expected[10..20].to_vec(), hits);

        let mut rejecting = GpuEvaluator::new(&model(f32::MAX), &tasks, 64, 64).unwrap();
        hits.clear();
        rejecting.scan(&integral, None, &mut hits).unwrap();
        assert!(hits.is_empty());
    }
}
