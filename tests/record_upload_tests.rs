mod test_utils;

use courseware_backend::{
    entities::user::Role,
    errors::AppError,
    use_cases::records::RecordHandler,
};
use test_utils::*;
use uuid::Uuid;

struct Ids {
    program: Uuid,
    topic: Uuid,
    record: Uuid,
}

impl Ids {
    fn new() -> Self {
        Ids { program: Uuid::new_v4(), topic: Uuid::new_v4(), record: Uuid::new_v4() }
    }

    fn record_dir(&self) -> String {
        format!("programs/{}/topics/{}/contents/{}", self.program, self.topic, self.record)
    }
}

fn topic_repo_for(ids: &Ids, owner: Uuid) -> MockTopicRepo {
    let (topic, program) = (ids.topic, ids.program);
    let mut topics = MockTopicRepo::new();
    topics
        .expect_find_topic()
        .returning(move |_| Ok(Some(topic_row(topic, program, owner))));
    topics
}

#[actix_rt::test]
async fn ids_may_follow_the_file() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let ids = Ids::new();

    let mut records = MockRecordRepo::new();
    records.expect_find_record().returning(|_| Ok(None));
    records
        .expect_upsert_record_image()
        .withf(|upsert| upsert.image == "image.PNG")
        .times(1)
        .returning(|upsert| Ok(record_from_upsert(upsert)));
    let handler = RecordHandler::new(records, topic_repo_for(&ids, owner.id), storage.pipeline());

    let mut demux = MultipartBody::new()
        .file("file", "Board.PNG", "image/png", &png_bytes(20, 20))
        .field("recordId", &ids.record.to_string())
        .field("topicId", &ids.topic.to_string())
        .field("programId", &ids.program.to_string())
        .into_demux();

    let response = handler.upload_image(&owner, &mut demux).await.unwrap();

    assert_eq!(response.record.id, ids.record);
    assert_eq!(response.program, ids.program);
    assert!(response.image_url.starts_with(&format!("/uploads/{}/compress/image.PNG?", ids.record_dir())));
    assert_eq!(
        storage.files(),
        vec![
            format!("{}/compress/image.PNG", ids.record_dir()),
            format!("{}/image.PNG", ids.record_dir()),
        ]
    );
    assert!(storage.tmp_files().is_empty());
}

#[actix_rt::test]
async fn missing_record_id_is_rejected_and_temp_file_removed() {
    let storage = TestStorage::new();
    let ids = Ids::new();

    let mut records = MockRecordRepo::new();
    records.expect_upsert_record_image().never();
    let mut topics = MockTopicRepo::new();
    topics.expect_find_topic().never();
    let handler = RecordHandler::new(records, topics, storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("programId", &ids.program.to_string())
        .field("topicId", &ids.topic.to_string())
        .file("image", "board.png", "image/png", &png_bytes(8, 8))
        .into_demux();

    let err = handler.upload_image(&principal(Role::Teacher), &mut demux).await.unwrap_err();

    assert!(err.to_string().contains("Please add a record id"));
    assert!(storage.tmp_files().is_empty());
    assert!(storage.files().is_empty());
}

#[actix_rt::test]
async fn a_file_is_required() {
    let storage = TestStorage::new();
    let ids = Ids::new();
    let handler = RecordHandler::new(MockRecordRepo::new(), MockTopicRepo::new(), storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("programId", &ids.program.to_string())
        .field("topicId", &ids.topic.to_string())
        .field("recordId", &ids.record.to_string())
        .into_demux();

    let err = handler.upload_image(&principal(Role::Teacher), &mut demux).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[actix_rt::test]
async fn non_owner_is_forbidden_before_anything_is_provisioned() {
    let storage = TestStorage::new();
    let ids = Ids::new();

    let mut records = MockRecordRepo::new();
    records.expect_upsert_record_image().never();
    let handler = RecordHandler::new(records, topic_repo_for(&ids, Uuid::new_v4()), storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("programId", &ids.program.to_string())
        .field("topicId", &ids.topic.to_string())
        .field("recordId", &ids.record.to_string())
        .file("image", "board.png", "image/png", &png_bytes(8, 8))
        .into_demux();

    let err = handler.upload_image(&principal(Role::Teacher), &mut demux).await.unwrap_err();

    assert!(matches!(err, AppError::ForbiddenAccess(_)));
    assert!(storage.files().is_empty());
    assert!(storage.tmp_files().is_empty());
}

#[actix_rt::test]
async fn topic_of_another_program_is_a_bad_request() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let ids = Ids::new();

    let handler = RecordHandler::new(
        MockRecordRepo::new(),
        topic_repo_for(&ids, owner.id),
        storage.pipeline(),
    );

    let mut demux = MultipartBody::new()
        .field("programId", &Uuid::new_v4().to_string())
        .field("topicId", &ids.topic.to_string())
        .field("recordId", &ids.record.to_string())
        .file("image", "board.png", "image/png", &png_bytes(8, 8))
        .into_demux();

    let err = handler.upload_image(&owner, &mut demux).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(storage.tmp_files().is_empty());
}

#[actix_rt::test]
async fn missing_topic_is_not_found() {
    let storage = TestStorage::new();
    let ids = Ids::new();

    let mut topics = MockTopicRepo::new();
    topics.expect_find_topic().returning(|_| Ok(None));
    let handler = RecordHandler::new(MockRecordRepo::new(), topics, storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("programId", &ids.program.to_string())
        .field("topicId", &ids.topic.to_string())
        .field("recordId", &ids.record.to_string())
        .file("image", "board.png", "image/png", &png_bytes(8, 8))
        .into_demux();

    let err = handler.upload_image(&principal(Role::Admin), &mut demux).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[actix_rt::test]
async fn failed_upsert_removes_the_new_record_directory() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let ids = Ids::new();

    let mut records = MockRecordRepo::new();
    records.expect_find_record().returning(|_| Ok(None));
    records
        .expect_upsert_record_image()
        .returning(|upsert| Err(AppError::Conflict(format!("Record {} belongs to another topic", upsert.id))));
    let handler = RecordHandler::new(records, topic_repo_for(&ids, owner.id), storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("programId", &ids.program.to_string())
        .field("topicId", &ids.topic.to_string())
        .field("recordId", &ids.record.to_string())
        .file("image", "board.jpg", "image/jpeg", &jpeg_bytes(8, 8))
        .into_demux();

    let err = handler.upload_image(&owner, &mut demux).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(!storage.root().join(ids.record_dir()).exists());
    assert!(storage.tmp_files().is_empty());
}

#[actix_rt::test]
async fn failed_upsert_keeps_the_saved_image_of_the_same_name() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let ids = Ids::new();

    let dir = storage.root().join(ids.record_dir());
    std::fs::create_dir_all(&dir).unwrap();
    let saved = jpeg_bytes(8, 8);
    std::fs::write(dir.join("image.jpg"), &saved).unwrap();

    let (record_id, topic_id, user_id) = (ids.record, ids.topic, owner.id);
    let mut records = MockRecordRepo::new();
    records.expect_find_record().returning(move |_| {
        Ok(Some(record_from_upsert(&courseware_backend::entities::record::RecordImageUpsert {
            id: record_id,
            topic_id,
            image: "image.jpg".into(),
            user_id,
        })))
    });
    records
        .expect_upsert_record_image()
        .returning(|_| Err(AppError::InternalError("database unavailable".into())));
    records.expect_set_record_image().never();
    let handler = RecordHandler::new(records, topic_repo_for(&ids, owner.id), storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("programId", &ids.program.to_string())
        .field("topicId", &ids.topic.to_string())
        .field("recordId", &ids.record.to_string())
        .file("image", "board.jpg", "image/jpeg", &jpeg_bytes(24, 24))
        .into_demux();

    let err = handler.upload_image(&owner, &mut demux).await.unwrap_err();

    assert!(matches!(err, AppError::InternalError(_)));
    assert_eq!(storage.files(), vec![format!("{}/image.jpg", ids.record_dir())]);
    assert_eq!(std::fs::read(dir.join("image.jpg")).unwrap(), saved);
    assert!(storage.tmp_files().is_empty());
}

#[actix_rt::test]
async fn new_extension_supersedes_the_previous_image() {
    let storage = TestStorage::new();
    let owner = principal(Role::Teacher);
    let ids = Ids::new();

    let dir = storage.root().join(ids.record_dir());
    std::fs::create_dir_all(dir.join("compress")).unwrap();
    std::fs::write(dir.join("image.jpg"), jpeg_bytes(8, 8)).unwrap();
    std::fs::write(dir.join("compress/image.jpg"), jpeg_bytes(8, 8)).unwrap();

    let (record_id, topic_id, user_id) = (ids.record, ids.topic, owner.id);
    let mut records = MockRecordRepo::new();
    records.expect_find_record().returning(move |_| {
        Ok(Some(record_from_upsert(&courseware_backend::entities::record::RecordImageUpsert {
            id: record_id,
            topic_id,
            image: "image.jpg".into(),
            user_id,
        })))
    });
    records
        .expect_upsert_record_image()
        .returning(|upsert| Ok(record_from_upsert(upsert)));
    let handler = RecordHandler::new(records, topic_repo_for(&ids, owner.id), storage.pipeline());

    let mut demux = MultipartBody::new()
        .field("programId", &ids.program.to_string())
        .field("topicId", &ids.topic.to_string())
        .field("recordId", &ids.record.to_string())
        .file("image", "board.png", "image/png", &png_bytes(8, 8))
        .into_demux();

    handler.upload_image(&owner, &mut demux).await.unwrap();

    assert_eq!(
        storage.files(),
        vec![
            format!("{}/compress/image.png", ids.record_dir()),
            format!("{}/image.png", ids.record_dir()),
        ]
    );
}

#[actix_rt::test]
async fn records_of_unpublished_topics_are_hidden() {
    let storage = TestStorage::new();
    let ids = Ids::new();
    let (topic, program) = (ids.topic, ids.program);

    let mut topics = MockTopicRepo::new();
    topics.expect_find_topic().returning(move |_| {
        let mut row = topic_row(topic, program, Uuid::new_v4());
        row.publish = false;
        Ok(Some(row))
    });
    let mut records = MockRecordRepo::new();
    records.expect_list_records().never();
    let handler = RecordHandler::new(records, topics, storage.pipeline());

    let err = handler.list_records(&ids.topic).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
