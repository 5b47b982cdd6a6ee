use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        response::Page,
        topic::{Topic, TopicChanges, TopicFields, TopicQuery, TopicView},
        upload::UploadSession,
    },
    errors::AppError,
    interfaces::multipart::Demultiplexer,
    repositories::{program::ProgramRepository, topic::TopicRepository},
    storage::{ImageCompressor, ImageTarget},
    use_cases::{
        extractors::{ensure_can_modify, Principal},
        upload::{cache_busted, Intake, Staging, UploadPipeline},
    },
};

pub struct TopicHandler<T, P, C>
where
    T: TopicRepository,
    P: ProgramRepository,
    C: ImageCompressor,
{
    pub topic_repo: T,
    pub program_repo: P,
    pub pipeline: UploadPipeline<C>,
}

impl<T, P, C> TopicHandler<T, P, C>
where
    T: TopicRepository,
    P: ProgramRepository,
    C: ImageCompressor,
{
    pub fn new(topic_repo: T, program_repo: P, pipeline: UploadPipeline<C>) -> Self {
        TopicHandler { topic_repo, program_repo, pipeline }
    }

    pub async fn list_published(
        &self,
        program: Option<Uuid>,
        page: Page,
    ) -> Result<(Vec<TopicView>, i64), AppError> {
        let query = TopicQuery {
            program,
            owner: None,
            published_only: true,
            limit: page.limit(),
            offset: page.offset(),
        };
        self.list(&query).await
    }

    pub async fn list_mine(
        &self,
        principal: &Principal,
        program: Option<Uuid>,
        page: Page,
    ) -> Result<(Vec<TopicView>, i64), AppError> {
        let query = TopicQuery {
            program,
            owner: (!principal.role.is_superadmin()).then_some(principal.id),
            published_only: false,
            limit: page.limit(),
            offset: page.offset(),
        };
        self.list(&query).await
    }

    async fn list(&self, query: &TopicQuery) -> Result<(Vec<TopicView>, i64), AppError> {
        let topics = self.topic_repo.list_topics(query).await?;
        let total = self.topic_repo.count_topics(query).await?;
        Ok((topics, total))
    }

    pub async fn get_published(&self, id: &Uuid) -> Result<TopicView, AppError> {
        self.topic_repo
            .find_topic_view(id)
            .await?
            .filter(|t| t.publish)
            .ok_or_else(|| not_found(id))
    }

    pub async fn get_mine(&self, principal: &Principal, id: &Uuid) -> Result<TopicView, AppError> {
        self.topic_repo
            .find_topic_view(id)
            .await?
            .filter(|t| principal.role.is_superadmin() || t.user.id == principal.id)
            .ok_or_else(|| not_found(id))
    }

    /// Creates a topic under a program the caller may modify. Nothing touches the disk until
    /// the program has been checked.
    pub async fn create_topic(
        &self,
        principal: &Principal,
        program_id: &Uuid,
        demux: &mut Demultiplexer,
    ) -> Result<Topic, AppError> {
        let program = self
            .program_repo
            .find_program(program_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No program with the id of {}", program_id)))?;
        ensure_can_modify(principal, program.user_id, "program")?;

        let id = Uuid::new_v4();
        let target = ImageTarget::TopicPhoto { program: program.id, topic: id };
        let mut session = UploadSession::new();

        match self.create_in_session(principal, demux, &mut session, (program.id, id), &target).await {
            Ok(topic) => {
                if session.placement.is_some() {
                    self.pipeline.compress(&target).await;
                }
                tracing::info!("Topic {} created in program {} by {}", topic.id, program.id, principal.id);
                Ok(topic)
            }
            Err(e) => {
                self.pipeline.rollback(&mut session).await;
                Err(e)
            }
        }
    }

    async fn create_in_session(
        &self,
        principal: &Principal,
        demux: &mut Demultiplexer,
        session: &mut UploadSession,
        (program_id, id): (Uuid, Uuid),
        target: &ImageTarget,
    ) -> Result<Topic, AppError> {
        self.pipeline.provision(session, target).await?;
        self.pipeline
            .receive(demux, session, Intake::photo(Staging::Final(*target)))
            .await?;

        let fields = TopicFields::try_from(&session.fields)?;
        fields.validate()?;

        let photo = UploadPipeline::<C>::planned_name(session, target);
        let insert = fields.into_insert(id, program_id, principal.id, photo)?;
        let created = self.topic_repo.insert_topic(&insert).await?;

        session.mark_committed()?;
        Ok(created)
    }

    pub async fn update_topic(
        &self,
        principal: &Principal,
        id: &Uuid,
        demux: &mut Demultiplexer,
    ) -> Result<Topic, AppError> {
        let existing = self.topic_repo.find_topic(id).await?.ok_or_else(|| not_found(id))?;
        ensure_can_modify(principal, existing.user_id, "topic")?;

        let target = ImageTarget::TopicPhoto { program: existing.program_id, topic: existing.id };
        let mut session = UploadSession::new();

        match self.update_in_session(demux, &mut session, id, &target, existing.photo.clone()).await {
            Ok(topic) => {
                if let Some(name) = UploadPipeline::<C>::planned_name(&session, &target) {
                    self.pipeline
                        .discard_superseded(&target, existing.photo.as_deref(), &name)
                        .await;
                    self.pipeline.compress(&target).await;
                }
                Ok(topic)
            }
            Err(e) => {
                self.pipeline.rollback(&mut session).await;
                Err(e)
            }
        }
    }

    async fn update_in_session(
        &self,
        demux: &mut Demultiplexer,
        session: &mut UploadSession,
        id: &Uuid,
        target: &ImageTarget,
        previous_photo: Option<String>,
    ) -> Result<Topic, AppError> {
        self.pipeline
            .receive(demux, session, Intake::photo(Staging::Beside(*target)))
            .await?;

        let fields = TopicFields::try_from(&session.fields)?;
        fields.validate()?;

        let changes = TopicChanges {
            fields,
            photo: UploadPipeline::<C>::planned_name(session, target).map(|name| cache_busted(&name)),
        };
        if changes.is_empty() {
            return Err(AppError::BadRequest("No recognized fields to update".into()));
        }
        let topic = self.topic_repo.update_topic(id, &changes).await?;
        if let Err(e) = self.pipeline.promote(session, target).await {
            tracing::error!("Photo of topic {} was saved but not moved into place: {}", id, e);
            if let Err(restore) = self.topic_repo.set_topic_photo(id, previous_photo).await {
                tracing::error!("Failed to restore photo of topic {}: {}", id, restore);
            }
            return Err(e);
        }

        session.mark_committed()?;
        Ok(topic)
    }

    pub async fn delete_topic(&self, principal: &Principal, id: &Uuid) -> Result<(), AppError> {
        let existing = self.topic_repo.find_topic(id).await?.ok_or_else(|| not_found(id))?;
        ensure_can_modify(principal, existing.user_id, "topic")?;

        self.topic_repo.delete_topic(id).await?;
        self.pipeline
            .remove_resource_dir(&self.pipeline.paths().topic_dir(existing.program_id, existing.id))
            .await;

        tracing::info!("Topic {} deleted by {}", id, principal.id);
        Ok(())
    }

    /// Bulk delete; callers are expected to be superadmins. Unknown ids are skipped.
    pub async fn delete_topics(&self, principal: &Principal, ids: &[Uuid]) -> Result<usize, AppError> {
        let deleted = self.topic_repo.delete_topics(ids).await?;
        for topic in &deleted {
            self.pipeline
                .remove_resource_dir(&self.pipeline.paths().topic_dir(topic.program_id, topic.id))
                .await;
        }

        tracing::info!("{} of {} topic(s) deleted by {}", deleted.len(), ids.len(), principal.id);
        Ok(deleted.len())
    }
}

fn not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("No topic with the id of {}", id))
}
