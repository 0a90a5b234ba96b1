//! `jobs.*` operations.
//!
//! A job runs one query and stores its full response in the catalog. Reads
//! of a job return the stored response; result reads page over it.

use bqlite_core::wire::{Job, JobStatus, QueryRequest, QueryResponse};
use bqlite_core::{Error, Result};
use tracing::info;

use crate::engine::{new_job_id, Engine};
use crate::response::{page, PageOptions};
use crate::validation::validate_job_id;

impl Engine {
    /// Runs a query job and stores its response under the job id.
    ///
    /// The job id comes from the body's `jobReference` when present and is
    /// generated otherwise.
    pub fn run_job(&mut self, job: &Job, project_id: &str) -> Result<Job> {
        let reference = job.job_reference.as_ref();
        let project = match reference.map(|r| r.project_id.as_str()) {
            Some(own) if !own.is_empty() => own.to_string(),
            _ => self.project(project_id).to_string(),
        };
        let config = job
            .configuration
            .query
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("Job has no query configuration".to_string()))?;
        let job_id = reference
            .map(|r| r.job_id.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_job_id);
        validate_job_id(&job_id)?;
        if self.catalog().get_job(&project, &job_id)?.is_some() {
            return Err(Error::AlreadyExists(format!("Job {}:{}", project, job_id)));
        }

        let request = QueryRequest {
            query: config.query.clone(),
            parameter_mode: config.parameter_mode.clone(),
            query_parameters: config.query_parameters.clone(),
            use_legacy_sql: config.use_legacy_sql,
            ..Default::default()
        };
        let response = self.query_as_job(&request, &project, &job_id)?;
        self.catalog()
            .put_job(&project, &job_id, &serde_json::to_value(&response)?)?;
        info!(project = %project, job_id = %job_id, failed = response.has_errors(), "job stored");

        Ok(Job {
            kind: Job::KIND.to_string(),
            id: Some(format!("{}:{}.{}", project, self.config.location, job_id)),
            job_reference: Some(response.job_reference.clone()),
            configuration: job.configuration.clone(),
            status: Some(JobStatus {
                state: "DONE".to_string(),
                error_result: response.errors.first().cloned(),
                errors: response.errors,
            }),
        })
    }

    /// The stored response of a job, verbatim.
    pub fn get_job(&self, project_id: &str, job_id: &str) -> Result<QueryResponse> {
        let project = self.project(project_id);
        let record = self
            .catalog()
            .get_job(project, job_id)?
            .ok_or_else(|| Error::NotFound(format!("Job {}:{}", project, job_id)))?;
        Ok(serde_json::from_value(record.response)?)
    }

    /// One page of a job's results. Without paging options (and without a
    /// configured default page size) this is the stored response.
    pub fn get_query_results(
        &self,
        project_id: &str,
        job_id: &str,
        options: &PageOptions,
    ) -> Result<QueryResponse> {
        let response = self.get_job(project_id, job_id)?;
        let start = options.start()?;
        let max_results = options.max_results.or(self.config.default_page_size);
        if start == 0 && max_results.is_none() {
            return Ok(response);
        }
        Ok(page(&response, start, max_results))
    }
}
