#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use dds::config::SchedulerConfig;
use dds::engine::{DeferredScheduler, PreemptionMode};
use dds::exec::{ProcessingNode, StageRequest, StageResult};
use dds::types::{PipelineId, StageIndex};
use parking_lot::Mutex;

use crate::fake_executor::RecordingWorkerPool;
use crate::fake_signals::{FakeFenceBackend, FakePropertyPool};

/// Node that records every stage it runs and answers from a script.
///
/// Results are scripted per stage and consumed in order; a stage without a
/// scripted result finishes with [`StageResult::done`].
pub struct ScriptedNode {
    name: String,
    pipeline: PipelineId,
    preempt_on_stop: bool,
    script: Mutex<HashMap<StageIndex, VecDeque<StageResult>>>,
    calls: Mutex<Vec<StageRequest>>,
}

impl ScriptedNode {
    pub fn new(name: &str, pipeline: PipelineId) -> Self {
        Self {
            name: name.to_string(),
            pipeline,
            preempt_on_stop: false,
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn preempt_on_stop(mut self) -> Self {
        self.preempt_on_stop = true;
        self
    }

    pub fn on_stage(self, stage: StageIndex, result: StageResult) -> Self {
        self.script(stage, result);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Queue another result for `stage`.
    pub fn script(&self, stage: StageIndex, result: StageResult) {
        self.script.lock().entry(stage).or_default().push_back(result);
    }

    pub fn calls(&self) -> Vec<StageRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn stages_run(&self) -> Vec<StageIndex> {
        self.calls.lock().iter().map(|c| c.stage).collect()
    }
}

impl ProcessingNode for ScriptedNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn pipeline_id(&self) -> PipelineId {
        self.pipeline
    }

    fn can_preempt_on_stop(&self) -> bool {
        self.preempt_on_stop
    }

    fn execute(&self, request: &StageRequest) -> StageResult {
        self.calls.lock().push(*request);
        self.script
            .lock()
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(StageResult::done)
    }
}

/// A scheduler wired to fakes.
pub struct Harness {
    pub scheduler: DeferredScheduler,
    pub workers: Arc<RecordingWorkerPool>,
    pub pools: Vec<Arc<FakePropertyPool>>,
    pub fences: Arc<FakeFenceBackend>,
}

impl Harness {
    /// One pipeline, queue depth 8, fence backend attached.
    pub fn new() -> Self {
        HarnessBuilder::new().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    pub fn pool(&self, pipeline: PipelineId) -> &Arc<FakePropertyPool> {
        &self.pools[pipeline as usize]
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HarnessBuilder {
    pipelines: u32,
    request_queue_depth: u64,
    fences: bool,
    verbose: bool,
    preemption: PreemptionMode,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            pipelines: 1,
            request_queue_depth: 8,
            fences: true,
            verbose: true,
            preemption: PreemptionMode::Disabled,
        }
    }

    pub fn pipelines(mut self, count: u32) -> Self {
        self.pipelines = count;
        self
    }

    pub fn request_queue_depth(mut self, depth: u64) -> Self {
        self.request_queue_depth = depth;
        self
    }

    pub fn without_fences(mut self) -> Self {
        self.fences = false;
        self
    }

    pub fn preemption(mut self, mode: PreemptionMode) -> Self {
        self.preemption = mode;
        self
    }

    pub fn build(self) -> Harness {
        let mut config = SchedulerConfig::default().with_name("harness");
        config.request_queue_depth = self.request_queue_depth;
        config.verbose_logging = self.verbose;

        let workers = RecordingWorkerPool::new();
        let fences = FakeFenceBackend::new();
        let pools: Vec<_> = (0..self.pipelines).map(FakePropertyPool::new).collect();

        let mut builder = DeferredScheduler::builder(config)
            .worker_pool(workers.clone())
            .preemption(self.preemption);
        for pool in &pools {
            builder = builder.pipeline_pool(pool.clone());
        }
        if self.fences {
            builder = builder.fence_backend(fences.clone());
        }

        Harness {
            scheduler: builder.build().expect("harness scheduler should build"),
            workers,
            pools,
            fences,
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
