//! The training worker.

use crate::{
    callbacks::{EarlyStopping, PlateauScheduler},
    checkpoint,
    common::*,
    config::Config,
    throughput::ThroughputMeter,
};

/// Per-epoch metrics appended to the training history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub lr: f64,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Runs the whole training session and writes its artifacts to `output_dir`.
pub fn training_worker(config: Arc<Config>, output_dir: Arc<PathBuf>) -> Result<()> {
    let device = config.training.device;
    let checkpoint_dir = output_dir.join("checkpoints");
    let best_weights_file = output_dir.join("best.ckpt");

    // load classes and persist the index map next to the weights
    let classes = Arc::new(ClassIndexMap::load_classes_file(
        &config.dataset.classes_file,
    )?);
    classes.save(output_dir.join("class_indices.json"))?;

    // build data generators
    let loader = ImageLoader::new(config.dataset.image_size.get(), None)?;
    let mut train_generator = BatchGeneratorInit {
        dataset_dir: config.dataset.train_dir.clone(),
        classes: classes.clone(),
        batch_size: config.dataset.batch_size,
        loader,
        augmentor: Some(config.augment.augmentor()?),
    }
    .build()?;
    let valid_generator = BatchGeneratorInit {
        dataset_dir: config.dataset.valid_dir.clone(),
        classes: classes.clone(),
        batch_size: config.dataset.batch_size,
        loader,
        augmentor: None,
    }
    .build()?;

    ensure!(
        train_generator.num_samples() > 0,
        "no training samples found in '{}'",
        config.dataset.train_dir.display()
    );
    ensure!(
        valid_generator.num_samples() > 0,
        "no validation samples found in '{}'",
        config.dataset.valid_dir.display()
    );
    info!(
        "training on {} classes with {} training and {} validation samples",
        classes.num_classes(),
        train_generator.num_samples(),
        valid_generator.num_samples()
    );

    // init model, optimizer and callbacks
    let mut classifier = Classifier::new(classes.num_classes(), device)?;
    let mut optimizer =
        nn::Adam::default().build(classifier.var_store(), config.training.initial_lr.raw())?;
    let mut scheduler = PlateauScheduler::new(
        config.training.initial_lr.raw(),
        config.training.lr_factor.raw(),
        config.training.lr_patience,
        config.training.min_lr.raw(),
    )?;
    let mut stopping = EarlyStopping::new(config.training.early_stopping_patience);

    let mut current_lr = scheduler.lr();
    let mut best_val_accuracy = 0.0;
    let mut history: Vec<EpochRecord> = vec![];
    let mut throughput = ThroughputMeter::new(Duration::from_secs(1));

    for epoch in 0..config.training.epochs.get() {
        // training pass
        let mut batch_losses = vec![];
        let mut num_correct = 0;
        let mut num_seen = 0;

        for batch_index in 0..train_generator.num_batches() {
            let (images, labels) = train_generator.batch(batch_index)?;
            let batch_len = images.size4()?.0;
            if batch_len == 0 {
                warn!("skipping empty batch {} in epoch {}", batch_index, epoch);
                continue;
            }

            let images = images.to_device(device);
            let targets = labels.max_dim(1, false).1.to_device(device);

            let logits = classifier.forward_t(&images, true);
            let loss = logits.cross_entropy_for_logits(&targets);
            optimizer.backward_step(&loss);

            batch_losses.push(f64::from(&loss));
            num_correct += count_matches(&logits, &targets);
            num_seen += batch_len;

            throughput.record(batch_len);
            if let Some(rate) = throughput.window_rate() {
                info!("epoch: {}\trate: {:.2} images/s", epoch, rate);
            }
        }

        ensure!(num_seen > 0, "every training batch was empty");
        let summary = throughput.finish_epoch();
        info!(
            "epoch: {}\timages: {}\telapsed: {:.1}s\trate: {:.2} images/s",
            epoch,
            summary.images,
            summary.seconds,
            summary.rate()
        );
        let train_loss = batch_losses.iter().sum::<f64>() / batch_losses.len() as f64;
        let train_accuracy = num_correct as f64 / num_seen as f64;

        // validation pass
        let (val_loss, val_accuracy) = validate(&classifier, &valid_generator, device, epoch)?;

        info!(
            "epoch: {}\tlr: {:.5e}\tloss: {:.5}\tacc: {:.5}\tval loss: {:.5}\tval acc: {:.5}",
            epoch, current_lr, train_loss, train_accuracy, val_loss, val_accuracy
        );
        history.push(EpochRecord {
            epoch,
            lr: current_lr,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
        });

        // keep the weights of the best validation loss for restoring later
        if stopping.observe(epoch, val_loss) {
            classifier.save(&best_weights_file)?;
        }

        // checkpoint whenever the validation accuracy improves
        if val_accuracy > best_val_accuracy {
            best_val_accuracy = val_accuracy;
            let path = checkpoint::save_checkpoint(
                classifier.var_store(),
                &checkpoint_dir,
                epoch,
                val_accuracy,
            )?;
            info!("saved checkpoint '{}'", path.display());
        }

        let lr = scheduler.step(val_loss);
        if lr != current_lr {
            info!("epoch: {}\treduce lr to {:.5e}", epoch, lr);
            optimizer.set_lr(lr);
            current_lr = lr;
        }

        if stopping.should_stop() {
            info!(
                "stopping early at epoch {}, the best epoch was {}",
                epoch,
                stopping.best_epoch()
            );
            break;
        }

        train_generator.on_epoch_end();
    }

    // restore the weights of the best epoch
    if best_weights_file.exists() {
        classifier
            .var_store_mut()
            .load(&best_weights_file)
            .with_context(|| {
                format!(
                    "failed to restore best weights from '{}'",
                    best_weights_file.display()
                )
            })?;
    }
    classifier.save(output_dir.join("model.ot"))?;

    let history_file = output_dir.join("history.json");
    let text = serde_json::to_string_pretty(&history)?;
    fs::write(&history_file, text)
        .with_context(|| format!("failed to write history file '{}'", history_file.display()))?;

    info!("saved training outputs to '{}'", output_dir.display());
    Ok(())
}

fn validate(
    classifier: &Classifier,
    generator: &BatchGenerator,
    device: Device,
    epoch: usize,
) -> Result<(f64, f64)> {
    let mut batch_losses = vec![];
    let mut num_correct = 0;
    let mut num_seen = 0;

    for batch_index in 0..generator.num_batches() {
        let (images, labels) = generator.batch(batch_index)?;
        let batch_len = images.size4()?.0;
        if batch_len == 0 {
            warn!(
                "skipping empty validation batch {} in epoch {}",
                batch_index, epoch
            );
            continue;
        }

        let images = images.to_device(device);
        let targets = labels.max_dim(1, false).1.to_device(device);

        let (loss, correct) = tch::no_grad(|| {
            let logits = classifier.forward_t(&images, false);
            let loss = f64::from(&logits.cross_entropy_for_logits(&targets));
            (loss, count_matches(&logits, &targets))
        });

        batch_losses.push(loss);
        num_correct += correct;
        num_seen += batch_len;
    }

    ensure!(num_seen > 0, "every validation batch was empty");
    let loss = batch_losses.iter().sum::<f64>() / batch_losses.len() as f64;
    let accuracy = num_correct as f64 / num_seen as f64;
    Ok((loss, accuracy))
}

fn count_matches(logits: &Tensor, targets: &Tensor) -> i64 {
    let predictions = logits.max_dim(1, false).1;
    i64::from(&predictions.eq_tensor(targets).count_nonzero(0))
}
