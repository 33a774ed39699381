mod common;

use std::sync::Arc;

use lesson_core::AccessReason;
use lesson_core::model::{
    Answer, LessonId, ProficiencyLevel, QuestionId, Role, SkillModule, TopicId, UserId,
    UserProfile,
};
use lesson_core::time::fixed_clock;
use services::{
    ApiError, AppServices, AttemptError, AuthError, AuthService, CatalogError, CatalogService,
    Credentials, FailureAction, GuardOutcome, LessonApi, LessonAttempt, RouteGuard,
};

#[tokio::test]
async fn login_stores_token_for_its_role_only() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    let guard = RouteGuard::new(Arc::clone(&tokens));
    assert_eq!(
        guard.check(Role::User),
        GuardOutcome::RedirectToLogin {
            path: "/user/login".into()
        }
    );

    let profile = common::signed_in(&api, &tokens).await;
    assert_eq!(profile.id, UserId::new(7));
    assert_eq!(guard.check(Role::User), GuardOutcome::Allow);
    assert!(!tokens.has_token(Role::Admin));
    assert_eq!(api.current_user().await.unwrap().name, "Mia");
}

#[tokio::test]
async fn rejected_login_keeps_existing_token() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    common::signed_in(&api, &tokens).await;
    let before = tokens.token(Role::User);

    let auth = AuthService::new(Arc::clone(&tokens));
    let err = auth
        .login(&api, &Credentials::new(common::EMAIL, "wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::LoginRejected { .. })));
    assert_eq!(tokens.token(Role::User), before);
}

#[tokio::test]
async fn expired_session_clears_only_that_role() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    common::signed_in(&api, &tokens).await;
    tokens.store(Role::Teacher, "teacher-token").await.unwrap();

    api.expire_sessions();
    let err = api.current_user().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { role: Role::User }));

    let auth = AuthService::new(Arc::clone(&tokens));
    let action = auth.resolve_failure(Role::User, &err).await;
    assert_eq!(
        action,
        FailureAction::RedirectToLogin {
            role: Role::User,
            path: "/user/login".into()
        }
    );
    assert!(!tokens.has_token(Role::User));
    assert!(tokens.has_token(Role::Teacher));
}

#[tokio::test]
async fn overview_locks_next_lesson_until_previous_passes() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    let viewer = common::signed_in(&api, &tokens).await;
    let shared: Arc<dyn LessonApi> = Arc::new(api.clone());
    let catalog = CatalogService::new(Arc::clone(&shared));

    let overview = catalog.topic_overview(TopicId::new(1), &viewer).await.unwrap();
    let reasons: Vec<AccessReason> = overview.lessons.iter().map(|l| l.decision.reason).collect();
    assert_eq!(reasons, vec![AccessReason::Ok, AccessReason::Sequential]);
    assert_eq!(
        overview.lessons[1].decision.blocked_by,
        Some(LessonId::new(1))
    );

    let (attempt, _events) = LessonAttempt::open(
        Arc::clone(&shared),
        LessonId::new(1),
        SkillModule::Grammar,
        fixed_clock(),
    )
    .await
    .unwrap();
    attempt
        .set_answer(QuestionId::new(1), Answer::Simple("B".into()))
        .unwrap();
    attempt.set_blank(QuestionId::new(2), 1, "have").unwrap();
    attempt.set_blank(QuestionId::new(2), 2, "cat").unwrap();
    attempt
        .set_answer(QuestionId::new(3), Answer::Simple("Hello".into()))
        .unwrap();
    assert!(attempt.submit().await.unwrap().is_passed);

    let access = catalog
        .check_lesson(TopicId::new(1), LessonId::new(2), &viewer)
        .await
        .unwrap();
    assert!(access.decision.accessible);
    assert!(!access.completed);
}

#[tokio::test]
async fn level_gate_applies_to_learners_but_not_staff() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    api.add_topic(common::topic(9, Some(ProficiencyLevel::B2), true));
    let mut gated = common::lesson(90, 1, None);
    gated.topic_id = TopicId::new(9);
    gated.required_level = Some(ProficiencyLevel::B2);
    api.add_lesson(gated, common::questions());
    let viewer = common::signed_in(&api, &tokens).await;

    let catalog = CatalogService::new(Arc::new(api.clone()));
    let row = catalog
        .check_lesson(TopicId::new(9), LessonId::new(90), &viewer)
        .await
        .unwrap();
    assert_eq!(row.decision.reason, AccessReason::TopicLevel);
    assert_eq!(row.decision.required_level, Some(ProficiencyLevel::B2));

    let teacher = UserProfile {
        id: UserId::new(2),
        name: "Tom".into(),
        level: None,
    };
    api.add_account("tom@example.com", "pw", Role::Teacher, teacher.clone());
    let teacher_api = api.with_role(Role::Teacher);
    AuthService::new(Arc::clone(&tokens))
        .login(&teacher_api, &Credentials::new("tom@example.com", "pw"))
        .await
        .unwrap();
    let staff = CatalogService::new(Arc::new(teacher_api));
    let row = staff
        .check_lesson(TopicId::new(9), LessonId::new(90), &teacher)
        .await
        .unwrap();
    assert!(row.decision.accessible);
}

#[tokio::test]
async fn learners_do_not_see_inactive_topics() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    api.add_topic(common::topic(5, None, false));
    let viewer = common::signed_in(&api, &tokens).await;

    let catalog = CatalogService::new(Arc::new(api));
    let page = catalog
        .topics(SkillModule::Grammar, 1, 10, &viewer)
        .await
        .unwrap();
    let ids: Vec<TopicId> = page.items.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TopicId::new(1)]);
    assert_eq!(page.page, 1);

    assert!(catalog.topics(SkillModule::Grammar, 0, 10, &viewer).await.is_err());
}

#[tokio::test]
async fn missing_token_is_reported_before_any_call() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    let err = api.get_lesson(LessonId::new(1)).await.unwrap_err();
    assert!(matches!(err, ApiError::MissingToken { role: Role::User }));
}

#[tokio::test]
async fn ungrouped_lesson_serves_all_questions_standalone() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    common::signed_in(&api, &tokens).await;

    let grouped = api.grouped_questions(LessonId::new(1)).await.unwrap();
    assert!(grouped.tasks.is_empty());
    assert_eq!(grouped.total_questions(), 3);
    assert_eq!(grouped.flatten()[0].id, QuestionId::new(1));
}

#[tokio::test]
async fn locked_lesson_cannot_be_opened_until_unlocked() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    let viewer = common::signed_in(&api, &tokens).await;
    let services = AppServices::from_parts(
        Role::User,
        fixed_clock(),
        Arc::new(api.clone()),
        Arc::clone(&tokens),
    );

    let err = services
        .open_attempt(TopicId::new(1), LessonId::new(2), &viewer)
        .await
        .err()
        .unwrap();
    match err {
        AttemptError::Catalog(CatalogError::Locked(decision)) => {
            assert_eq!(decision.reason, AccessReason::Sequential);
            assert_eq!(decision.blocked_by, Some(LessonId::new(1)));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = services
        .open_attempt(TopicId::new(1), LessonId::new(90), &viewer)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        AttemptError::Catalog(CatalogError::LessonNotInTopic(id)) if id == LessonId::new(90)
    ));

    api.mark_completed(viewer.id, LessonId::new(1));
    let (attempt, _events) = services
        .open_attempt(TopicId::new(1), LessonId::new(2), &viewer)
        .await
        .unwrap();
    attempt
        .with_player(|player| assert_eq!(player.module(), SkillModule::Grammar))
        .unwrap();
}

#[tokio::test]
async fn hidden_topic_locks_its_lessons_for_learners() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    api.add_topic(common::topic(5, None, false));
    let mut hidden = common::lesson(50, 1, None);
    hidden.topic_id = TopicId::new(5);
    api.add_lesson(hidden, common::questions());
    let viewer = common::signed_in(&api, &tokens).await;
    let services = AppServices::from_parts(
        Role::User,
        fixed_clock(),
        Arc::new(api.clone()),
        Arc::clone(&tokens),
    );

    let err = services
        .open_attempt(TopicId::new(5), LessonId::new(50), &viewer)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        AttemptError::Catalog(CatalogError::Locked(decision))
            if decision.reason == AccessReason::Inactive
    ));
}

#[tokio::test]
async fn staff_open_gated_lessons() {
    let tokens = common::tokens().await;
    let api = common::backend(Arc::clone(&tokens), None);
    let teacher = UserProfile {
        id: UserId::new(2),
        name: "Tom".into(),
        level: None,
    };
    api.add_account("tom@example.com", "pw", Role::Teacher, teacher.clone());
    let teacher_api = api.with_role(Role::Teacher);
    AuthService::new(Arc::clone(&tokens))
        .login(&teacher_api, &Credentials::new("tom@example.com", "pw"))
        .await
        .unwrap();
    let services = AppServices::from_parts(
        Role::Teacher,
        fixed_clock(),
        Arc::new(teacher_api),
        Arc::clone(&tokens),
    );

    let opened = services
        .open_attempt(TopicId::new(1), LessonId::new(2), &teacher)
        .await;
    assert!(opened.is_ok());
}
