//! Integration tests for vm-catalog
//!
//! Covers template creation defaults, partial updates, renames, clones,
//! integrity reporting and the reference tracking that guards network and
//! storage pool deletion.

use vm_catalog::host::MAX_MEM_LIM;
use vm_catalog::media::MediaKind;
use vm_catalog::template::{
    CpuInfoPatch, DiskFormat, DiskRequest, GraphicsPatch, MemoryPatch, PoolRefRequest,
    SourceMedia, Topology,
};
use vm_catalog::test_utils::{
    create_test_catalog, create_test_catalog_with_media, MOCK_ISO, TEST_HOST_MEMORY_MIB,
};
use vm_catalog::{
    CreateNetworkRequest, CreateStoragePoolRequest, CreateTemplateRequest, ResourceState,
    UpdateTemplateRequest,
};

fn iso_template(name: &str) -> CreateTemplateRequest {
    CreateTemplateRequest {
        name: name.to_string(),
        source_media: Some(SourceMedia {
            kind: "disk".to_string(),
            path: Some(MOCK_ISO.to_string()),
        }),
        ..Default::default()
    }
}

fn dir_pool(name: &str) -> CreateStoragePoolRequest {
    CreateStoragePoolRequest {
        name: name.to_string(),
        kind: "dir".to_string(),
        path: Some(format!("/tmp/{}", name)),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_template_applies_defaults() {
    let catalog = create_test_catalog().await;

    let info = catalog
        .create_template(iso_template("test"))
        .await
        .expect("Failed to create template");
    let template = info.template;

    assert_eq!(template.name, "test");
    assert_eq!(template.os_distro, "ubuntu");
    assert_eq!(template.os_version, "14.04");
    assert_eq!(template.icon, "images/icon-ubuntu.png");
    assert_eq!(template.cdrom.as_deref(), Some(MOCK_ISO));
    assert_eq!(template.memory.current, 1024);
    assert_eq!(template.memory.maxmemory, 1024);
    assert_eq!(template.cpu_info.vcpus, 1);
    assert_eq!(template.cpu_info.maxvcpus, 1);
    assert_eq!(template.networks, vec!["default"]);
    assert!(template.folder.is_empty());

    assert_eq!(template.disks.len(), 1);
    let disk = &template.disks[0];
    assert_eq!(disk.index, 0);
    assert_eq!(disk.size, Some(10));
    assert_eq!(disk.format, DiskFormat::Qcow2);
    assert_eq!(disk.pool.name, "/api/v1/storagepools/default");

    assert!(info.invalid.is_empty());
}

#[tokio::test]
async fn test_create_template_requires_source() {
    let catalog = create_test_catalog().await;

    let err = catalog
        .create_template(CreateTemplateRequest {
            name: "test".to_string(),
            os_distro: Some("ImagineOS".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0016E"));

    let err = catalog
        .create_template(CreateTemplateRequest {
            name: "test".to_string(),
            source_media: Some(SourceMedia {
                kind: "floppy".to_string(),
                path: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0017E"));

    assert!(catalog.list_templates().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_netboot_template_has_no_cdrom() {
    let catalog = create_test_catalog().await;

    let info = catalog
        .create_template(CreateTemplateRequest {
            name: "pxe".to_string(),
            source_media: Some(SourceMedia {
                kind: "netboot".to_string(),
                path: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(info.template.cdrom.is_none());
    assert_eq!(info.template.os_distro, "unknown");
    assert_eq!(info.template.icon, "images/icon-vm.png");
}

#[tokio::test]
async fn test_base_image_becomes_first_disk() {
    let (catalog, media) = create_test_catalog_with_media().await;
    media.insert(
        "/tmp/base.qcow2",
        MediaKind::Image {
            format: DiskFormat::Qcow2,
            size_gib: 20,
        },
    );

    let info = catalog
        .create_template(CreateTemplateRequest {
            name: "from-image".to_string(),
            source_media: Some(SourceMedia {
                kind: "disk".to_string(),
                path: Some("/tmp/base.qcow2".to_string()),
            }),
            ..Default::default()
        })
        .await
        .unwrap();

    let disk = &info.template.disks[0];
    assert!(info.template.cdrom.is_none());
    assert_eq!(disk.base.as_deref(), Some("/tmp/base.qcow2"));
    assert_eq!(disk.size, Some(20));

    // Removing the base image is reported, not fatal
    media.remove("/tmp/base.qcow2");
    let info = catalog.get_template("from-image").await.unwrap();
    assert_eq!(info.invalid["disks"], vec!["/tmp/base.qcow2"]);
}

#[tokio::test]
async fn test_duplicate_template_rejected() {
    let catalog = create_test_catalog().await;
    catalog.create_template(iso_template("test")).await.unwrap();

    let err = catalog
        .create_template(iso_template("test"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0001E"));
}

#[tokio::test]
async fn test_memory_only_current_raises_maxmemory() {
    let catalog = create_test_catalog().await;

    let mut req = iso_template("test");
    req.memory = Some(MemoryPatch {
        current: Some(2048),
        maxmemory: None,
    });
    let info = catalog.create_template(req).await.unwrap();
    assert_eq!(info.template.memory.current, 2048);
    assert_eq!(info.template.memory.maxmemory, 2048);
}

#[tokio::test]
async fn test_memory_limits() {
    let catalog = create_test_catalog().await;

    let mut req = iso_template("too-much");
    req.memory = Some(MemoryPatch {
        current: Some(TEST_HOST_MEMORY_MIB + 1024),
        maxmemory: None,
    });
    let err = catalog.create_template(req).await.unwrap_err();
    assert_eq!(err.code(), Some("KCHVM0041E"));
    assert!(err.to_string().contains(&TEST_HOST_MEMORY_MIB.to_string()));

    let mut req = iso_template("above-ceiling");
    req.memory = Some(MemoryPatch {
        current: None,
        maxmemory: Some(MAX_MEM_LIM + 1024),
    });
    let err = catalog.create_template(req).await.unwrap_err();
    assert_eq!(err.code(), Some("KCHVM0079E"));

    catalog.create_template(iso_template("test")).await.unwrap();
    let err = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                memory: Some(MemoryPatch {
                    current: Some(4096),
                    maxmemory: Some(1024),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0031E"));
}

#[tokio::test]
async fn test_update_merges_nested_objects() {
    let catalog = create_test_catalog().await;
    catalog.create_template(iso_template("test")).await.unwrap();

    let outcome = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                graphics: Some(GraphicsPatch {
                    kind: Some("spice".to_string()),
                    listen: None,
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.renamed_from.is_none());

    let outcome = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                graphics: Some(GraphicsPatch {
                    kind: None,
                    listen: Some("fe00::0".to_string()),
                }),
                memory: Some(MemoryPatch {
                    current: None,
                    maxmemory: Some(3072),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let template = outcome.template.template;
    assert_eq!(
        serde_json::to_value(&template.graphics).unwrap(),
        serde_json::json!({"type": "spice", "listen": "fe00::0"})
    );
    assert_eq!(template.memory.current, 1024);
    assert_eq!(template.memory.maxmemory, 3072);
    assert_eq!(template.os_distro, "ubuntu");
}

#[tokio::test]
async fn test_update_cpu_topology() {
    let catalog = create_test_catalog().await;
    catalog.create_template(iso_template("test")).await.unwrap();

    let outcome = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                cpu_info: Some(CpuInfoPatch {
                    vcpus: Some(2),
                    maxvcpus: Some(4),
                    topology: Some(Topology {
                        sockets: 1,
                        cores: 2,
                        threads: 2,
                    }),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.template.template.cpu_info.maxvcpus, 4);

    let err = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                cpu_info: Some(CpuInfoPatch {
                    vcpus: Some(3),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHCPUINF0002E"));

    // Failed updates leave the record untouched
    let info = catalog.get_template("test").await.unwrap();
    assert_eq!(info.template.cpu_info.vcpus, 2);
}

#[tokio::test]
async fn test_update_cdrom_validation() {
    let (catalog, media) = create_test_catalog_with_media().await;
    media.insert(
        "/tmp/existent.iso",
        MediaKind::Iso {
            distro: None,
            version: None,
        },
    );
    catalog.create_template(iso_template("test")).await.unwrap();

    let err = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                cdrom: Some(Some("inexistent.iso".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0006E"));

    for cdrom in ["/tmp/existent.iso", "https://mirror.example.org/fedora.iso"] {
        let outcome = catalog
            .update_template(
                "test",
                UpdateTemplateRequest {
                    cdrom: Some(Some(cdrom.to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.template.template.cdrom.as_deref(), Some(cdrom));
    }
}

#[tokio::test]
async fn test_update_clears_cdrom() {
    let catalog = create_test_catalog().await;
    catalog.create_template(iso_template("test")).await.unwrap();

    let outcome = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                cdrom: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.template.template.cdrom.is_none());
    assert!(catalog.get_template("test").await.unwrap().template.cdrom.is_none());
}

#[tokio::test]
async fn test_rename_moves_record_and_references() {
    let catalog = create_test_catalog().await;
    catalog.create_template(iso_template("test")).await.unwrap();
    catalog.create_template(iso_template("other")).await.unwrap();

    let err = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                name: Some("other".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0001E"));

    let outcome = catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                name: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.renamed_from.as_deref(), Some("test"));
    assert_eq!(outcome.template.template.name, "renamed");

    let err = catalog.get_template("test").await.unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0002E"));

    catalog.delete_template("other").await.unwrap();
    catalog.deactivate_network("default").await.unwrap();
    let err = catalog.delete_network("default").await.unwrap_err();
    assert!(err.to_string().contains("renamed"));
}

#[tokio::test]
async fn test_clone_picks_first_free_suffix() {
    let catalog = create_test_catalog().await;
    catalog.create_template(iso_template("test")).await.unwrap();

    let first = catalog.clone_template("test").await.unwrap();
    let second = catalog.clone_template("test").await.unwrap();
    assert_eq!(first.template.name, "test-clone1");
    assert_eq!(second.template.name, "test-clone2");

    catalog.delete_template("test-clone1").await.unwrap();
    let third = catalog.clone_template("test").await.unwrap();
    assert_eq!(third.template.name, "test-clone1");

    let original = catalog.get_template("test").await.unwrap();
    assert_eq!(third.template.memory, original.template.memory);
    assert_eq!(third.template.disks, original.template.disks);

    let err = catalog.clone_template("missing").await.unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0002E"));
}

#[tokio::test]
async fn test_list_templates() {
    let catalog = create_test_catalog().await;
    for name in ["b", "a", "c"] {
        catalog.create_template(iso_template(name)).await.unwrap();
    }

    let names: Vec<String> = catalog
        .list_templates()
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.template.name)
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|name| ["a", "b", "c"].contains(&name.as_str())));
}

#[tokio::test]
async fn test_template_networks_must_exist() {
    let catalog = create_test_catalog().await;

    let mut req = iso_template("test");
    req.networks = Some(vec!["nowhere".to_string()]);
    let err = catalog.create_template(req).await.unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0003E"));
}

#[tokio::test]
async fn test_disks_on_inactive_or_missing_pool() {
    let catalog = create_test_catalog().await;
    catalog.create_storagepool(dir_pool("dir-pool")).await.unwrap();

    let disk_on = |pool: &str| DiskRequest {
        size: Some(5),
        pool: Some(PoolRefRequest {
            name: format!("/api/v1/storagepools/{}", pool),
        }),
        ..Default::default()
    };

    let mut req = iso_template("test");
    req.disks = Some(vec![disk_on("dir-pool")]);
    let err = catalog.create_template(req).await.unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0005E"));

    let mut req = iso_template("test");
    req.disks = Some(vec![disk_on("nowhere")]);
    let err = catalog.create_template(req).await.unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0004E"));

    catalog.activate_storagepool("dir-pool").await.unwrap();
    let mut req = iso_template("test");
    req.disks = Some(vec![disk_on("dir-pool"), disk_on("default")]);
    let info = catalog.create_template(req).await.unwrap();
    let indexes: Vec<u32> = info.template.disks.iter().map(|d| d.index).collect();
    assert_eq!(indexes, vec![0, 1]);
}

#[tokio::test]
async fn test_readonly_pool_disks_need_volume() {
    let catalog = create_test_catalog().await;
    let mut pool = CreateStoragePoolRequest {
        name: "iscsi-pool".to_string(),
        kind: "iscsi".to_string(),
        ..Default::default()
    };
    pool.source = Some(vm_catalog::storagepool::PoolSource {
        host: Some("127.0.0.1".to_string()),
        target: Some("iqn.2015-01.localhost.test".to_string()),
        ..Default::default()
    });
    catalog.create_storagepool(pool).await.unwrap();
    catalog.activate_storagepool("iscsi-pool").await.unwrap();

    let volumes = catalog.list_storagevolumes("iscsi-pool").await.unwrap();
    assert_eq!(volumes.len(), 2);

    let disk = |volume: Option<&str>| DiskRequest {
        pool: Some(PoolRefRequest {
            name: "/api/v1/storagepools/iscsi-pool".to_string(),
        }),
        volume: volume.map(str::to_string),
        ..Default::default()
    };

    let mut req = iso_template("test");
    req.disks = Some(vec![disk(Some("unit:0:0:9"))]);
    let err = catalog.create_template(req).await.unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0019E"));

    let mut req = iso_template("test");
    req.disks = Some(vec![disk(Some(volumes[0].name.as_str()))]);
    let info = catalog.create_template(req).await.unwrap();
    let disk = &info.template.disks[0];
    assert!(disk.size.is_none());
    assert_eq!(disk.volume.as_deref(), Some(volumes[0].name.as_str()));
}

#[tokio::test]
async fn test_referenced_network_cannot_be_deleted() {
    let catalog = create_test_catalog().await;
    let network = catalog
        .create_network(CreateNetworkRequest {
            name: "nat-network".to_string(),
            connection: "nat".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(network.network.state, ResourceState::Inactive);

    let mut req = iso_template("test");
    req.networks = Some(vec!["nat-network".to_string()]);
    catalog.create_template(req).await.unwrap();
    assert!(catalog.get_network("nat-network").await.unwrap().in_use);

    let err = catalog.delete_network("nat-network").await.unwrap_err();
    assert_eq!(err.code(), Some("KCHNET0017E"));
    assert!(err.to_string().contains("test"));

    catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                networks: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    catalog.delete_network("nat-network").await.unwrap();

    let err = catalog.get_network("nat-network").await.unwrap_err();
    assert_eq!(err.code(), Some("KCHNET0002E"));
}

#[tokio::test]
async fn test_referenced_pool_cannot_be_deleted() {
    let catalog = create_test_catalog().await;
    catalog.create_storagepool(dir_pool("dir-pool")).await.unwrap();
    catalog.activate_storagepool("dir-pool").await.unwrap();

    let mut req = iso_template("test");
    req.disks = Some(vec![DiskRequest {
        size: Some(1),
        pool: Some(PoolRefRequest {
            name: "/api/v1/storagepools/dir-pool".to_string(),
        }),
        ..Default::default()
    }]);
    catalog.create_template(req).await.unwrap();

    catalog.deactivate_storagepool("dir-pool").await.unwrap();
    let err = catalog.delete_storagepool("dir-pool").await.unwrap_err();
    assert_eq!(err.code(), Some("KCHPOOL0035E"));

    catalog.delete_template("test").await.unwrap();
    catalog.delete_storagepool("dir-pool").await.unwrap();
}

#[tokio::test]
async fn test_pool_released_by_template_update() {
    let catalog = create_test_catalog().await;
    catalog.create_storagepool(dir_pool("dir-pool")).await.unwrap();
    catalog.activate_storagepool("dir-pool").await.unwrap();

    let mut req = iso_template("test");
    req.disks = Some(vec![DiskRequest {
        size: Some(1),
        pool: Some(PoolRefRequest {
            name: "/api/v1/storagepools/dir-pool".to_string(),
        }),
        ..Default::default()
    }]);
    catalog.create_template(req).await.unwrap();
    assert!(catalog.get_storagepool("dir-pool").await.unwrap().in_use);

    // Move the disk back onto the default pool
    catalog
        .update_template(
            "test",
            UpdateTemplateRequest {
                disks: Some(vec![DiskRequest {
                    size: Some(1),
                    ..Default::default()
                }]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!catalog.get_storagepool("dir-pool").await.unwrap().in_use);

    catalog.deactivate_storagepool("dir-pool").await.unwrap();
    catalog.delete_storagepool("dir-pool").await.unwrap();
    assert!(catalog.get_template("test").await.unwrap().invalid.is_empty());
}

#[tokio::test]
async fn test_encoded_pool_reference_resolves() {
    let catalog = create_test_catalog().await;
    catalog
        .create_storagepool(dir_pool("ünïcode pool"))
        .await
        .unwrap();
    catalog.activate_storagepool("ünïcode pool").await.unwrap();

    let mut req = iso_template("test");
    req.disks = Some(vec![DiskRequest {
        size: Some(1),
        pool: Some(PoolRefRequest {
            name: "/api/v1/storagepools/%C3%BCn%C3%AFcode%20pool".to_string(),
        }),
        ..Default::default()
    }]);
    let info = catalog.create_template(req).await.unwrap();
    assert_eq!(
        info.template.disks[0].pool.name,
        "/api/v1/storagepools/ünïcode pool"
    );
    assert!(catalog.get_storagepool("ünïcode pool").await.unwrap().in_use);
}

#[tokio::test]
async fn test_base_image_rejected_on_readonly_pool() {
    let (catalog, media) = create_test_catalog_with_media().await;
    media.insert(
        "/tmp/base.qcow2",
        MediaKind::Image {
            format: DiskFormat::Qcow2,
            size_gib: 20,
        },
    );
    let pool = CreateStoragePoolRequest {
        name: "scsi-pool".to_string(),
        kind: "scsi".to_string(),
        source: Some(vm_catalog::storagepool::PoolSource {
            adapter_name: Some("scsi_host2".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    catalog.create_storagepool(pool).await.unwrap();
    catalog.activate_storagepool("scsi-pool").await.unwrap();

    let err = catalog
        .create_template(CreateTemplateRequest {
            name: "from-image".to_string(),
            source_media: Some(SourceMedia {
                kind: "disk".to_string(),
                path: Some("/tmp/base.qcow2".to_string()),
            }),
            disks: Some(vec![DiskRequest {
                volume: Some("unit:0:0:1".to_string()),
                pool: Some(PoolRefRequest {
                    name: "scsi-pool".to_string(),
                }),
                ..Default::default()
            }]),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("KCHTMPL0020E"));
    assert!(catalog.get_template("from-image").await.is_err());
}

#[tokio::test]
async fn test_active_resources_cannot_be_deleted() {
    let catalog = create_test_catalog().await;

    let err = catalog.delete_network("default").await.unwrap_err();
    assert_eq!(err.code(), Some("KCHNET0005E"));

    let err = catalog.delete_storagepool("default").await.unwrap_err();
    assert_eq!(err.code(), Some("KCHPOOL0005E"));
}

#[tokio::test]
async fn test_missing_cdrom_reported_as_invalid() {
    let (catalog, media) = create_test_catalog_with_media().await;
    media.insert(
        "/tmp/volume.iso",
        MediaKind::Iso {
            distro: Some("fedora".to_string()),
            version: Some("21".to_string()),
        },
    );

    let mut req = iso_template("test");
    req.source_media = None;
    req.cdrom = Some("/tmp/volume.iso".to_string());
    let info = catalog.create_template(req).await.unwrap();
    assert_eq!(info.template.os_distro, "fedora");
    assert!(info.invalid.is_empty());

    media.remove("/tmp/volume.iso");
    let info = catalog.get_template("test").await.unwrap();
    assert_eq!(info.invalid["cdrom"], vec!["/tmp/volume.iso"]);
}

#[tokio::test]
async fn test_seed_defaults_is_idempotent() {
    let catalog = create_test_catalog().await;
    catalog.seed_defaults().await.unwrap();

    assert_eq!(catalog.list_networks().await.unwrap().len(), 1);
    assert_eq!(catalog.list_storagepools().await.unwrap().len(), 1);
}
