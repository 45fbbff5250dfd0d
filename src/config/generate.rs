pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CONVEYOR CONFIGURATION
# =============================================================================
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/conveyor/config.yml
#   3. /etc/conveyor/config.yml
#
# Any value may reference an environment variable with $env{NAME}. Use this
# for connection strings rather than writing secrets into the file.

# =============================================================================
# SCHEDULER
# =============================================================================

scheduler:
  # Lease taken on a source while it is scheduled. A crashed instance holds
  # the source for at most this long.
  lock_duration_seconds: 30
  # Time between scheduling passes over all sources
  pass_interval: 30s
  # Work batches buffered before enqueueing blocks (one batch per source pass)
  queue_capacity: 1000

# =============================================================================
# INDEX
# =============================================================================

index:
  url: http://localhost:9200
  # Mapping templates are fetched from <mappings_path><mapping name>.json.
  # Every ___type_name___ in a template is replaced with the source's type key.
  mappings_path: https://example.com/mappings/
  template_timeout: 30s

# =============================================================================
# STREAM CONSUMER
# =============================================================================

consumer:
  # Minimum time between partition checkpoints
  checkpoint_interval: 1m

# =============================================================================
# SOURCES
# =============================================================================
# scheduler_type selects the scheduling strategy:
#   windowed   Emits one work item per time window since the last pass.
#              Property WindowMinutes sets the window length (default 1).
#
# Stream sources name a parser and their stream in properties:
#   Parser                   bracketed | sitecore
#   EventHubName             Name of the event stream
#   StorageConnectionString  Lease and checkpoint store

sources:
  - type_key: sitecore_prod
    scheduler_type: windowed
    scheduling_frequency: 5m
    connection_string: $env{CONVEYOR_SITECORE_CONNECTION}
    index_names: [sitecore-logs]
    mapping_name: sitecore
    properties:
      WindowMinutes: "5"

  - type_key: web_diagnostics
    active: false
    scheduler_type: windowed
    scheduling_frequency: 1m
    connection_string: $env{CONVEYOR_STREAM_CONNECTION}
    index_names: [web-logs]
    properties:
      Parser: bracketed
      EventHubName: web-diagnostics
      StorageConnectionString: $env{CONVEYOR_STORAGE_CONNECTION}
"#
    .to_string()
}
