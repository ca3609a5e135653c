use std::collections::HashMap;

use crate::queue::job::Job;

/// Insertion-ordered collection of jobs with a name index.
///
/// A job's position in the vector is its index for the lifetime of the
/// queue; the registry is append-only. Lookups by unknown index or name
/// return `None` rather than failing.
#[derive(Default)]
pub(crate) struct JobRegistry {
    jobs: Vec<Job>,
    by_name: HashMap<String, usize>,
}

impl JobRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a job, returning its index. The caller guarantees the name is
    /// unique (checked at `add_job`).
    pub(crate) fn push(&mut self, job: Job) -> usize {
        let index = self.jobs.len();
        debug_assert_eq!(job.index(), index);
        self.by_name.insert(job.name().to_string(), index);
        self.jobs.push(job);
        index
    }

    pub(crate) fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Job> {
        self.jobs.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Job> {
        self.jobs.get_mut(index)
    }

    pub(crate) fn get_by_name(&self, name: &str) -> Option<&Job> {
        self.by_name.get(name).and_then(|&i| self.jobs.get(i))
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.jobs.iter_mut()
    }
}
