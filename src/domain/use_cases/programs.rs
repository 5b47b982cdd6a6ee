use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        program::{Program, ProgramChanges, ProgramFields, ProgramQuery, ProgramView},
        response::Page,
        upload::UploadSession,
    },
    errors::AppError,
    interfaces::multipart::Demultiplexer,
    repositories::program::ProgramRepository,
    storage::{ImageCompressor, ImageTarget},
    use_cases::{
        extractors::{ensure_can_modify, Principal},
        upload::{cache_busted, Intake, Staging, UploadPipeline},
    },
};

pub struct ProgramHandler<R, C>
where
    R: ProgramRepository,
    C: ImageCompressor,
{
    pub program_repo: R,
    pub pipeline: UploadPipeline<C>,
}

impl<R, C> ProgramHandler<R, C>
where
    R: ProgramRepository,
    C: ImageCompressor,
{
    pub fn new(program_repo: R, pipeline: UploadPipeline<C>) -> Self {
        ProgramHandler { program_repo, pipeline }
    }

    /// Published programs, newest first
    pub async fn list_published(&self, page: Page) -> Result<(Vec<ProgramView>, i64), AppError> {
        let query = ProgramQuery {
            owner: None,
            published_only: true,
            limit: page.limit(),
            offset: page.offset(),
        };
        self.list(&query).await
    }

    /// Programs of the caller, or every program for a superadmin
    pub async fn list_mine(&self, principal: &Principal, page: Page) -> Result<(Vec<ProgramView>, i64), AppError> {
        let query = ProgramQuery {
            owner: (!principal.role.is_superadmin()).then_some(principal.id),
            published_only: false,
            limit: page.limit(),
            offset: page.offset(),
        };
        self.list(&query).await
    }

    async fn list(&self, query: &ProgramQuery) -> Result<(Vec<ProgramView>, i64), AppError> {
        let programs = self.program_repo.list_programs(query).await?;
        let total = self.program_repo.count_programs(query).await?;
        Ok((programs, total))
    }

    /// A published program; unpublished ones are reported as missing
    pub async fn get_published(&self, id: &Uuid) -> Result<ProgramView, AppError> {
        self.program_repo
            .find_program_view(id)
            .await?
            .filter(|p| p.publish)
            .ok_or_else(|| not_found(id))
    }

    /// One of the caller's programs, published or not
    pub async fn get_mine(&self, principal: &Principal, id: &Uuid) -> Result<ProgramView, AppError> {
        self.program_repo
            .find_program_view(id)
            .await?
            .filter(|p| principal.role.is_superadmin() || p.user.id == principal.id)
            .ok_or_else(|| not_found(id))
    }

    /// Creates a program from a multipart body. The id is allocated before the body is read
    /// because the photo directory is named after it.
    pub async fn create_program(
        &self,
        principal: &Principal,
        demux: &mut Demultiplexer,
    ) -> Result<Program, AppError> {
        let id = Uuid::new_v4();
        let target = ImageTarget::ProgramPhoto { program: id };
        let mut session = UploadSession::new();

        match self.create_in_session(principal, demux, &mut session, id, &target).await {
            Ok(program) => {
                if session.placement.is_some() {
                    self.pipeline.compress(&target).await;
                }
                tracing::info!("Program {} created by {}", program.id, principal.id);
                Ok(program)
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
        id: Uuid,
        target: &ImageTarget,
    ) -> Result<Program, AppError> {
        self.pipeline.provision(session, target).await?;
        self.pipeline
            .receive(demux, session, Intake::photo(Staging::Final(*target)))
            .await?;

        let fields = ProgramFields::try_from(&session.fields)?;
        fields.validate()?;
        self.ensure_types_exist(&fields).await?;

        let photo = UploadPipeline::<C>::planned_name(session, target);
        let insert = fields.into_insert(id, principal.id, photo)?;
        let program = self.program_repo.insert_program(&insert).await?;

        session.mark_committed()?;
        Ok(program)
    }

    /// Applies a multipart update. A new photo replaces the old one once the row is saved.
    pub async fn update_program(
        &self,
        principal: &Principal,
        id: &Uuid,
        demux: &mut Demultiplexer,
    ) -> Result<Program, AppError> {
        let existing = self
            .program_repo
            .find_program(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        ensure_can_modify(principal, existing.user_id, "program")?;

        let target = ImageTarget::ProgramPhoto { program: *id };
        let mut session = UploadSession::new();

        match self.update_in_session(demux, &mut session, id, &target, existing.photo.clone()).await {
            Ok(program) => {
                if let Some(name) = UploadPipeline::<C>::planned_name(&session, &target) {
                    self.pipeline
                        .discard_superseded(&target, existing.photo.as_deref(), &name)
                        .await;
                    self.pipeline.compress(&target).await;
                }
                Ok(program)
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
    ) -> Result<Program, AppError> {
        self.pipeline
            .receive(demux, session, Intake::photo(Staging::Beside(*target)))
            .await?;

        let fields = ProgramFields::try_from(&session.fields)?;
        fields.validate()?;
        self.ensure_types_exist(&fields).await?;

        let changes = ProgramChanges {
            fields,
            photo: UploadPipeline::<C>::planned_name(session, target).map(|name| cache_busted(&name)),
        };
        if changes.is_empty() {
            return Err(AppError::BadRequest("No recognized fields to update".into()));
        }
        let program = self.program_repo.update_program(id, &changes).await?;
        if let Err(e) = self.pipeline.promote(session, target).await {
            tracing::error!("Photo of program {} was saved but not moved into place: {}", id, e);
            if let Err(restore) = self.program_repo.set_program_photo(id, previous_photo).await {
                tracing::error!("Failed to restore photo of program {}: {}", id, restore);
            }
            return Err(e);
        }

        session.mark_committed()?;
        Ok(program)
    }

    /// Deletes the program and everything stored under its directory
    pub async fn delete_program(&self, principal: &Principal, id: &Uuid) -> Result<(), AppError> {
        let existing = self
            .program_repo
            .find_program(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        ensure_can_modify(principal, existing.user_id, "program")?;

        self.program_repo.delete_program(id).await?;
        self.pipeline
            .remove_resource_dir(&self.pipeline.paths().program_dir(*id))
            .await;

        tracing::info!("Program {} deleted by {}", id, principal.id);
        Ok(())
    }

    async fn ensure_types_exist(&self, fields: &ProgramFields) -> Result<(), AppError> {
        let Some(types) = fields.types.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        let missing = self.program_repo.missing_program_types(types).await?;
        if missing.is_empty() {
            return Ok(());
        }
        let missing = missing.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ");
        Err(AppError::invalid("types", format!("Unknown program types: {}", missing)))
    }
}

fn not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("No program with the id of {}", id))
}
