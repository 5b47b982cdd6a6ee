use uuid::Uuid;

use crate::{
    entities::{
        record::{Record, RecordImageResponse, RecordImageUpsert},
        upload::{FormFields, UploadSession},
    },
    errors::AppError,
    interfaces::multipart::Demultiplexer,
    repositories::{record::RecordRepository, topic::TopicRepository},
    storage::{ImageCompressor, ImageTarget},
    use_cases::{
        extractors::{ensure_can_modify, Principal},
        upload::{cache_busted, Intake, Staging, UploadPipeline},
    },
};

pub struct RecordHandler<R, T, C>
where
    R: RecordRepository,
    T: TopicRepository,
    C: ImageCompressor,
{
    pub record_repo: R,
    pub topic_repo: T,
    pub pipeline: UploadPipeline<C>,
}

impl<R, T, C> RecordHandler<R, T, C>
where
    R: RecordRepository,
    T: TopicRepository,
    C: ImageCompressor,
{
    pub fn new(record_repo: R, topic_repo: T, pipeline: UploadPipeline<C>) -> Self {
        RecordHandler { record_repo, topic_repo, pipeline }
    }

    /// Records of a published topic
    pub async fn list_records(&self, topic_id: &Uuid) -> Result<Vec<Record>, AppError> {
        self.topic_repo
            .find_topic(topic_id)
            .await?
            .filter(|t| t.publish)
            .ok_or_else(|| AppError::NotFound(format!("No topic with the id of {}", topic_id)))?;

        self.record_repo.list_records(topic_id).await
    }

    /// Stores the image of a topic record. The destination ids are form fields that may follow
    /// the file, so the file is buffered in the temp directory, staged beside its final path once
    /// they are known, and renamed over the previous image only after the row is saved.
    pub async fn upload_image(
        &self,
        principal: &Principal,
        demux: &mut Demultiplexer,
    ) -> Result<RecordImageResponse, AppError> {
        let mut session = UploadSession::new();

        match self.upload_in_session(principal, demux, &mut session).await {
            Ok((target, previous, record)) => {
                let name = record.image.clone().unwrap_or_default();
                self.pipeline.discard_superseded(&target, previous.as_deref(), &name).await;
                self.pipeline.compress(&target).await;

                tracing::info!("Stored image {} for record {}", name, record.id);
                Ok(RecordImageResponse {
                    image_url: cache_busted(&self.pipeline.paths().compressed_url(&target, &name)),
                    program: target.program(),
                    record,
                })
            }
            Err(e) => {
                self.pipeline.rollback(&mut session).await;
                Err(e)
            }
        }
    }

    async fn upload_in_session(
        &self,
        principal: &Principal,
        demux: &mut Demultiplexer,
        session: &mut UploadSession,
    ) -> Result<(ImageTarget, Option<String>, Record), AppError> {
        self.pipeline
            .receive(demux, session, Intake::any_field(Staging::Temporary))
            .await?;

        let program_id = required_id(&session.fields, "programId", "Please add a program id")?;
        let topic_id = required_id(&session.fields, "topicId", "Please add a topic id")?;
        let record_id = required_id(&session.fields, "recordId", "Please add a record id")?;
        if session.placement.is_none() {
            return Err(AppError::invalid("image", "Please upload a file"));
        }

        let topic = self
            .topic_repo
            .find_topic(&topic_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No topic with the id of {}", topic_id)))?;
        if topic.program_id != program_id {
            return Err(AppError::BadRequest(format!(
                "Topic {} does not belong to program {}",
                topic_id, program_id
            )));
        }
        ensure_can_modify(principal, topic.user_id, "topic")?;

        let target = ImageTarget::RecordImage { program: program_id, topic: topic_id, record: record_id };
        self.pipeline.provision(session, &target).await?;
        self.pipeline.stage(session, &target).await?;

        let image = UploadPipeline::<C>::planned_name(session, &target)
            .ok_or_else(|| AppError::InternalError("uploaded image was not placed".into()))?;
        let previous = self
            .record_repo
            .find_record(&record_id)
            .await?
            .filter(|r| r.topic_id == topic_id)
            .and_then(|r| r.image);

        let record = self
            .record_repo
            .upsert_record_image(&RecordImageUpsert {
                id: record_id,
                topic_id,
                image,
                user_id: principal.id,
            })
            .await?;

        if let Err(e) = self.pipeline.promote(session, &target).await {
            tracing::error!("Image of record {} was saved but not moved into place: {}", record_id, e);
            if let Err(restore) = self.record_repo.set_record_image(&record_id, previous).await {
                tracing::error!("Failed to restore image of record {}: {}", record_id, restore);
            }
            return Err(e);
        }

        session.mark_committed()?;
        Ok((target, previous, record))
    }
}

fn required_id(fields: &FormFields, name: &str, missing: &str) -> Result<Uuid, AppError> {
    fields.uuid(name)?.ok_or_else(|| AppError::invalid(name, missing))
}
