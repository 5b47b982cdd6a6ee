mod test_utils;

use courseware_backend::{
    entities::user::Role,
    errors::AppError,
    use_cases::programs::ProgramHandler,
};
use test_utils::*;
use uuid::Uuid;

#[actix_rt::test]
async fn create_program_stores_photo_and_compressed_copy() {
    let storage = TestStorage::new();
    let manager = principal(Role::Teacher);

    let mut repo = MockProgramRepo::new();
    repo.expect_insert_program()
        .withf(|insert| insert.title == "Algebra" && insert.publish)
        .times(1)
        .returning(|insert| Ok(program_from_insert(insert)));
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("title", "Algebra")
        .field("publish", "true")
        .file("photo", "diagram.PNG", "image/png", &png_bytes(32, 24))
        .into_demux();

    let program = handler.create_program(&manager, &mut demux).await.unwrap();

    assert_eq!(program.photo.as_deref(), Some("photo.PNG"));
    assert_eq!(program.user_id, manager.id);
    assert_eq!(
        storage.files(),
        vec![
            format!("programs/{}/photo/compress/photo.PNG", program.id),
            format!("programs/{}/photo/photo.PNG", program.id),
        ]
    );
}

#[actix_rt::test]
async fn create_program_without_photo_skips_compression() {
    let storage = TestStorage::new();

    let mut repo = MockProgramRepo::new();
    repo.expect_insert_program()
        .withf(|insert| insert.photo.is_none())
        .returning(|insert| Ok(program_from_insert(insert)));
    let handler = ProgramHandler::new(repo, storage.pipeline_with(StalledCompressor));

    let mut demux = MultipartBody::new().field("title", "Geometry").into_demux();
    let program = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        handler.create_program(&principal(Role::Admin), &mut demux),
    )
    .await
    .expect("compression must not run without a file")
    .unwrap();

    assert!(program.photo.is_none());
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn stalled_compression_still_commits_the_program() {
    let mut storage = TestStorage::new();
    storage.settings.compression_timeout_secs = 1;

    let mut repo = MockProgramRepo::new();
    repo.expect_insert_program()
        .times(1)
        .returning(|insert| Ok(program_from_insert(insert)));
    let handler = ProgramHandler::new(repo, storage.pipeline_with(StalledCompressor));

    let mut demux = MultipartBody::new()
        .field("title", "Algebra")
        .file("photo", "diagram.PNG", "image/png", &png_bytes(16, 16))
        .into_demux();

    let program = handler.create_program(&principal(Role::Teacher), &mut demux).await.unwrap();

    assert_eq!(program.photo.as_deref(), Some("photo.PNG"));
    assert_eq!(storage.files(), vec![format!("programs/{}/photo/photo.PNG", program.id)]);
    let compressed = storage.root().join(format!("programs/{}/photo/compress", program.id));
    let leftovers = std::fs::read_dir(&compressed).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[actix_rt::test]
async fn failed_insert_rolls_back_the_program_directory() {
    let storage = TestStorage::new();

    let mut repo = MockProgramRepo::new();
    repo.expect_insert_program()
        .returning(|_| Err(AppError::Conflict("duplicate".into())));
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .file("photo", "cover.jpg", "image/jpeg", &jpeg_bytes(16, 16))
        .field("title", "Algebra")
        .into_demux();

    let err = handler.create_program(&principal(Role::Teacher), &mut demux).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(storage.files().is_empty());
    let programs_dir = storage.root().join("programs");
    let leftovers = std::fs::read_dir(&programs_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[actix_rt::test]
async fn disallowed_extension_is_rejected_and_rolled_back() {
    let storage = TestStorage::new();
    let mut repo = MockProgramRepo::new();
    repo.expect_insert_program().never();
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("title", "Algebra")
        .file("photo", "diagram.gif", "image/gif", b"GIF89a....")
        .into_demux();

    let err = handler.create_program(&principal(Role::Teacher), &mut demux).await.unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn bytes_that_are_not_an_image_are_rejected() {
    let storage = TestStorage::new();
    let mut repo = MockProgramRepo::new();
    repo.expect_insert_program().never();
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("title", "Algebra")
        .file("photo", "notes.png", "image/png", b"this is plain text, not a png")
        .into_demux();

    let err = handler.create_program(&principal(Role::Teacher), &mut demux).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn oversized_photo_is_rejected() {
    let storage = TestStorage::new();
    let mut repo = MockProgramRepo::new();
    repo.expect_insert_program().never();
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut big = png_bytes(8, 8);
    big.resize(storage.settings.max_file_size as usize + 1, 0);
    let mut demux = MultipartBody::new()
        .field("title", "Algebra")
        .file("photo", "big.png", "image/png", &big)
        .into_demux();

    let err = handler.create_program(&principal(Role::Teacher), &mut demux).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn unknown_program_types_are_rejected() {
    let storage = TestStorage::new();
    let unknown = Uuid::new_v4();

    let mut repo = MockProgramRepo::new();
    repo.expect_missing_program_types()
        .returning(move |ids| Ok(ids.to_vec()));
    repo.expect_insert_program().never();
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("title", "Algebra")
        .field("types", &format!("[\"{unknown}\"]"))
        .into_demux();

    let err = handler.create_program(&principal(Role::Teacher), &mut demux).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[actix_rt::test]
async fn update_replaces_photo_and_removes_superseded_one() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let id = Uuid::new_v4();

    let photo_dir = storage.root().join(format!("programs/{id}/photo"));
    std::fs::create_dir_all(photo_dir.join("compress")).unwrap();
    std::fs::write(photo_dir.join("photo.jpg"), jpeg_bytes(8, 8)).unwrap();
    std::fs::write(photo_dir.join("compress/photo.jpg"), jpeg_bytes(8, 8)).unwrap();

    let mut repo = MockProgramRepo::new();
    repo.expect_find_program()
        .returning(move |_| Ok(Some(program_row(id, owner.id, Some("photo.jpg?1700000000000")))));
    repo.expect_update_program()
        .withf(|_, changes| {
            changes.photo.as_deref().is_some_and(|p| p.starts_with("photo.png?"))
                && changes.fields.title.as_deref() == Some("Algebra II")
        })
        .returning(move |_, changes| {
            let mut program = program_row(id, owner.id, changes.photo.as_deref());
            program.title = "Algebra II".into();
            Ok(program)
        });
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .file("photo", "new.png", "image/png", &png_bytes(10, 10))
        .field("title", "Algebra II")
        .into_demux();

    let program = handler.update_program(&owner, &id, &mut demux).await.unwrap();

    assert_eq!(program.title, "Algebra II");
    assert_eq!(
        storage.files(),
        vec![
            format!("programs/{id}/photo/compress/photo.png"),
            format!("programs/{id}/photo/photo.png"),
        ]
    );
}

#[actix_rt::test]
async fn failed_update_keeps_the_existing_photo() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let id = Uuid::new_v4();

    let photo_dir = storage.root().join(format!("programs/{id}/photo"));
    std::fs::create_dir_all(&photo_dir).unwrap();
    std::fs::write(photo_dir.join("photo.png"), png_bytes(8, 8)).unwrap();

    let mut repo = MockProgramRepo::new();
    repo.expect_find_program()
        .returning(move |_| Ok(Some(program_row(id, owner.id, Some("photo.png")))));
    repo.expect_update_program()
        .returning(|_, _| Err(AppError::InternalError("database unavailable".into())));
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .file("photo", "replacement.png", "image/png", &png_bytes(12, 12))
        .into_demux();

    assert!(handler.update_program(&owner, &id, &mut demux).await.is_err());
    assert_eq!(storage.files(), vec![format!("programs/{id}/photo/photo.png")]);
}

#[actix_rt::test]
async fn photo_that_cannot_be_moved_into_place_restores_the_previous_name() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let id = Uuid::new_v4();

    let photo_dir = storage.root().join(format!("programs/{id}/photo"));
    std::fs::create_dir_all(photo_dir.join("photo.png")).unwrap();
    std::fs::write(photo_dir.join("photo.png/blocker"), b"occupied").unwrap();
    std::fs::write(photo_dir.join("photo.jpg"), jpeg_bytes(8, 8)).unwrap();

    let mut repo = MockProgramRepo::new();
    repo.expect_find_program()
        .returning(move |_| Ok(Some(program_row(id, owner.id, Some("photo.jpg")))));
    repo.expect_update_program()
        .returning(move |_, changes| Ok(program_row(id, owner.id, changes.photo.as_deref())));
    repo.expect_set_program_photo()
        .withf(|_, photo| photo.as_deref() == Some("photo.jpg"))
        .times(1)
        .returning(|_, _| Ok(()));
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .file("photo", "new.png", "image/png", &png_bytes(10, 10))
        .into_demux();

    let err = handler.update_program(&owner, &id, &mut demux).await.unwrap_err();

    assert!(matches!(err, AppError::StorageError(_)));
    assert_eq!(
        storage.files(),
        vec![
            format!("programs/{id}/photo/photo.jpg"),
            format!("programs/{id}/photo/photo.png/blocker"),
        ]
    );
}

#[actix_rt::test]
async fn non_owner_cannot_update_and_nothing_is_written() {
    let storage = TestStorage::new();
    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();

    let mut repo = MockProgramRepo::new();
    repo.expect_find_program()
        .returning(move |_| Ok(Some(program_row(id, owner, None))));
    repo.expect_update_program().never();
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new()
        .file("photo", "new.png", "image/png", &png_bytes(10, 10))
        .into_demux();

    let err = handler
        .update_program(&principal(Role::Teacher), &id, &mut demux)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ForbiddenAccess(_)));
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn superadmin_may_update_any_program() {
    let storage = TestStorage::new();
    let id = Uuid::new_v4();
    let owner = Uuid::new_v4();

    let mut repo = MockProgramRepo::new();
    repo.expect_find_program()
        .returning(move |_| Ok(Some(program_row(id, owner, None))));
    repo.expect_update_program()
        .returning(move |_, _| Ok(program_row(id, owner, None)));
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new().field("publish", "off").into_demux();
    assert!(handler
        .update_program(&principal(Role::Superadmin), &id, &mut demux)
        .await
        .is_ok());
}

#[actix_rt::test]
async fn update_of_missing_program_is_not_found() {
    let storage = TestStorage::new();
    let mut repo = MockProgramRepo::new();
    repo.expect_find_program().returning(|_| Ok(None));
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let mut demux = MultipartBody::new().field("title", "x").into_demux();
    let err = handler
        .update_program(&principal(Role::Teacher), &Uuid::new_v4(), &mut demux)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[actix_rt::test]
async fn delete_removes_the_program_directory() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let id = Uuid::new_v4();

    let topic_dir = storage.root().join(format!("programs/{id}/topics/{}/photo", Uuid::new_v4()));
    std::fs::create_dir_all(&topic_dir).unwrap();
    std::fs::write(topic_dir.join("photo.png"), png_bytes(4, 4)).unwrap();

    let mut repo = MockProgramRepo::new();
    repo.expect_find_program()
        .returning(move |_| Ok(Some(program_row(id, owner.id, None))));
    repo.expect_delete_program().times(1).returning(|_| Ok(()));
    let handler = ProgramHandler::new(repo, storage.pipeline());

    handler.delete_program(&owner, &id).await.unwrap();

    assert!(!storage.root().join(format!("programs/{id}")).exists());
}

#[actix_rt::test]
async fn non_owner_cannot_delete() {
    let storage = TestStorage::new();
    let id = Uuid::new_v4();

    let mut repo = MockProgramRepo::new();
    repo.expect_find_program()
        .returning(move |_| Ok(Some(program_row(id, Uuid::new_v4(), None))));
    repo.expect_delete_program().never();
    let handler = ProgramHandler::new(repo, storage.pipeline());

    let err = handler.delete_program(&principal(Role::Admin), &id).await.unwrap_err();
    assert!(matches!(err, AppError::ForbiddenAccess(_)));
}
